//! Text rendering for results and progress.

use ocrjob_client::events::{JobEvent, JobEventKind};

/// Pretty-print a result payload with two-space indentation.
pub fn render_result(result: &serde_json::Value) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

/// One progress line for an event, or `None` if it has nothing to show.
///
/// Completion and failure are reported by the caller, not here.
pub fn describe_event(event: &JobEvent) -> Option<String> {
    match &event.kind {
        JobEventKind::Submitted { job_id, file_count } => {
            Some(format!("Job ID: {job_id} ({file_count} file(s))"))
        }
        JobEventKind::PollProgress { sub_state, .. } => Some(format!("Status: {sub_state}")),
        JobEventKind::PollAttemptFailed { attempt, error, .. } => {
            Some(format!("Status check {attempt} failed, retrying: {error}"))
        }
        JobEventKind::Completed { .. } | JobEventKind::Failed { .. } | JobEventKind::Reset => None,
    }
}
