//! Lifecycle events emitted by the job controller.
//!
//! Broadcast over a [`tokio::sync::broadcast`] channel so a presentation
//! layer (or a test) can follow a job without polling the controller's
//! snapshot. Publishing with no subscribers is silently dropped.

use chrono::Utc;
use ocrjob_core::types::{JobId, Timestamp};
use serde::Serialize;

/// Something that happened to the current job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEventKind {
    /// The service accepted the upload and assigned an id.
    Submitted { job_id: JobId, file_count: usize },

    /// A poll attempt reported the job as still pending or processing.
    PollProgress {
        job_id: JobId,
        attempt: u32,
        sub_state: String,
    },

    /// A poll attempt failed and will be retried.
    PollAttemptFailed {
        job_id: JobId,
        attempt: u32,
        error: String,
    },

    /// The job reached a terminal state on the service.
    Completed {
        job_id: JobId,
        attempts: u32,
        /// Summary body exactly as the service returned it.
        result: serde_json::Value,
    },

    /// The cycle ended in `Failed`.
    Failed {
        job_id: Option<JobId>,
        error: String,
    },

    /// The controller was reset to `Idle`.
    Reset,
}

/// A [`JobEventKind`] stamped with the time it was emitted.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    #[serde(flatten)]
    pub kind: JobEventKind,
    pub timestamp: Timestamp,
}

impl JobEvent {
    pub fn new(kind: JobEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }
}

impl From<JobEventKind> for JobEvent {
    fn from(kind: JobEventKind) -> Self {
        Self::new(kind)
    }
}
