//! Remote job state names reported by the Job Service summary endpoint.
//!
//! Only the two in-progress values are meaningful to the client. Every
//! other value (or a missing `state` field) is treated as terminal.

/// The job is queued and has not started processing.
pub const STATE_PENDING: &str = "PENDING";

/// The job is being processed.
pub const STATE_PROCESSING: &str = "PROCESSING";

/// Field name carrying the remote state in a summary body.
pub const STATE_FIELD: &str = "state";

/// Whether a remote state means the job is still running.
pub fn is_in_progress(state: &str) -> bool {
    state == STATE_PENDING || state == STATE_PROCESSING
}

/// Extract the in-progress sub-state from a summary body, if it has one.
pub fn in_progress_state(body: &serde_json::Value) -> Option<&str> {
    body.get(STATE_FIELD)
        .and_then(|s| s.as_str())
        .filter(|s| is_in_progress(s))
}
