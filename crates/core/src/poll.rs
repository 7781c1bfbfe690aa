//! Fixed-interval poll policy and per-attempt classification.
//!
//! The poll loop itself lives in `ocrjob-client`; this module holds the
//! pure decision of what a single summary response means.

use std::time::Duration;

use crate::job_state;

/// Default delay after each non-terminal attempt.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default attempt budget (about five minutes at the default interval).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 150;

/// Cadence and budget for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay after each attempt that did not reach a terminal state.
    pub interval: Duration,
    /// Maximum number of summary requests before declaring a timeout.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// What one poll attempt means for the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The job reported `PENDING` or `PROCESSING`.
    InProgress { sub_state: String },
    /// Successful response with a terminal state; the body is the result.
    Terminal { result: serde_json::Value },
    /// The attempt failed (HTTP error, transport or decode failure).
    Retry { error: String },
}

/// Classify a decoded summary response.
///
/// The remote state is checked before the HTTP status, so an in-progress
/// body is never treated as a failure even on a non-2xx response.
pub fn classify(status: u16, body: serde_json::Value) -> AttemptOutcome {
    if let Some(sub_state) = job_state::in_progress_state(&body) {
        return AttemptOutcome::InProgress {
            sub_state: sub_state.to_string(),
        };
    }

    if (200..300).contains(&status) {
        AttemptOutcome::Terminal { result: body }
    } else {
        AttemptOutcome::Retry {
            error: format!("summary returned HTTP {status}"),
        }
    }
}
