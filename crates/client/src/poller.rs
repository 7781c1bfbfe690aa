//! Fixed-interval, bounded polling of a job's summary endpoint.
//!
//! [`poll_until_terminal`] issues one summary request at a time, sleeps a
//! fixed interval after every non-terminal attempt, and stops on the first
//! terminal success, when the attempt budget runs out, or when the
//! [`CancellationToken`] is triggered.
//!
//! Per-attempt failures (HTTP errors, transport or decode errors) are not
//! surfaced individually. They count against the budget and are reported
//! through the `on_attempt` callback and the final timeout's `last_error`.

use ocrjob_core::poll::{classify, AttemptOutcome, PollPolicy};
use ocrjob_core::types::JobId;
use tokio_util::sync::CancellationToken;

use crate::api::JobService;

/// A job that reached a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSuccess {
    /// Summary body exactly as the service returned it.
    pub result: serde_json::Value,
    /// Number of summary requests made, including the terminal one.
    pub attempts: u32,
}

/// Why a polling loop ended without a terminal result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("no terminal state after {attempts} attempts")]
    TimedOut {
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("polling cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// Poll `job_id` until it reaches a terminal state.
///
/// `on_attempt` is called once per request, in order, with the 1-based
/// attempt number and its classification (including the terminal one).
pub async fn poll_until_terminal<S>(
    service: &S,
    job_id: &JobId,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut on_attempt: impl FnMut(u32, &AttemptOutcome),
) -> Result<PollSuccess, PollError>
where
    S: JobService + ?Sized,
{
    let mut last_error: Option<String> = None;

    for attempt in 1..=policy.max_attempts {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %job_id, attempt, "Polling cancelled");
                return Err(PollError::Cancelled { attempts: attempt - 1 });
            }
            response = service.fetch_summary(job_id) => match response {
                Ok(summary) => classify(summary.status, summary.body),
                Err(e) => AttemptOutcome::Retry { error: e.to_string() },
            },
        };

        on_attempt(attempt, &outcome);

        match outcome {
            AttemptOutcome::Terminal { result } => {
                tracing::info!(job_id = %job_id, attempt, "Job reached a terminal state");
                return Ok(PollSuccess {
                    result,
                    attempts: attempt,
                });
            }
            AttemptOutcome::InProgress { sub_state } => {
                tracing::debug!(job_id = %job_id, attempt, sub_state = %sub_state, "Job still running");
            }
            AttemptOutcome::Retry { error } => {
                tracing::warn!(
                    job_id = %job_id,
                    attempt,
                    error = %error,
                    "Poll attempt {attempt} failed",
                );
                last_error = Some(error);
            }
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(job_id = %job_id, attempt, "Polling cancelled");
                    return Err(PollError::Cancelled { attempts: attempt });
                }
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    tracing::error!(
        job_id = %job_id,
        attempts = policy.max_attempts,
        last_error = ?last_error,
        "Polling timed out",
    );

    Err(PollError::TimedOut {
        attempts: policy.max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use ocrjob_core::types::FileBlob;
    use serde_json::json;

    use crate::api::{OcrApiError, SummaryResponse};

    /// Replays canned summaries; repeats the last one when the script runs out.
    struct Scripted {
        responses: Mutex<VecDeque<(u16, serde_json::Value)>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(responses: Vec<(u16, serde_json::Value)>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl JobService for Scripted {
        async fn submit_job(&self, _files: &[FileBlob]) -> Result<JobId, OcrApiError> {
            unreachable!("poller never submits")
        }

        async fn fetch_summary(&self, _job_id: &JobId) -> Result<SummaryResponse, OcrApiError> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            let (status, body) = if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                responses.front().cloned().unwrap()
            };
            Ok(SummaryResponse { status, body })
        }
    }

    fn job() -> JobId {
        JobId::new("J1").unwrap()
    }

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(2),
            max_attempts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_terminal_response() {
        let service = Scripted::new(vec![
            (200, json!({"state": "PENDING"})),
            (200, json!({"state": "PROCESSING"})),
            (200, json!({"state": "DONE", "text": "hello"})),
        ]);
        let mut seen = Vec::new();

        let outcome = poll_until_terminal(&service, &job(), &policy(150), &CancellationToken::new(), |n, o| {
            seen.push((n, matches!(o, AttemptOutcome::Terminal { .. })))
        })
        .await
        .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result, json!({"state": "DONE", "text": "hello"}));
        assert_eq!(service.calls(), 3);
        assert_eq!(seen, vec![(1, false), (2, false), (3, true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn http_failures_are_retried_until_success() {
        let service = Scripted::new(vec![
            (502, json!({"detail": "bad gateway"})),
            (200, json!({"state": "DONE"})),
        ]);

        let outcome = poll_until_terminal(&service, &job(), &policy(5), &CancellationToken::new(), |_, _| {})
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_exactly_max_attempts() {
        let service = Scripted::new(vec![(200, json!({"state": "PENDING"}))]);

        let err = poll_until_terminal(&service, &job(), &policy(150), &CancellationToken::new(), |_, _| {})
            .await
            .unwrap_err();

        assert_matches!(err, PollError::TimedOut { attempts: 150, last_error: None });
        assert_eq!(service.calls(), 150);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_last_attempt_error() {
        let service = Scripted::new(vec![(500, json!({}))]);

        let err = poll_until_terminal(&service, &job(), &policy(3), &CancellationToken::new(), |_, _| {})
            .await
            .unwrap_err();

        assert_matches!(err, PollError::TimedOut { attempts: 3, last_error: Some(e) } if e.contains("500"));
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_interval_between_attempts_but_not_after_last() {
        let service = Scripted::new(vec![(200, json!({"state": "PENDING"}))]);
        let start = tokio::time::Instant::now();

        let _ = poll_until_terminal(&service, &job(), &policy(4), &CancellationToken::new(), |_, _| {}).await;

        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_request() {
        let service = Scripted::new(vec![(200, json!({"state": "PENDING"}))]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = poll_until_terminal(&service, &job(), &policy(150), &cancel, |_, _| {})
            .await
            .unwrap_err();

        assert_eq!(err, PollError::Cancelled { attempts: 0 });
        assert_eq!(service.calls(), 0);
    }
}
