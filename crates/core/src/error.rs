/// Message shown when a submission is attempted with no files.
pub const NO_FILES_MESSAGE: &str = "Please select at least one file.";

/// Failures surfaced by the job lifecycle controller.
///
/// `Validation`, `Submission` and `PollTimeout` always leave the lifecycle
/// in `Failed` with this error's display text as the stored message.
/// `ShutDown` does the same when it interrupts a submission or poll loop,
/// and leaves the state untouched when it rejects a new one.
/// `Busy`, `NotPolling` and `Abandoned` leave the state untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error("Upload failed: {0}")]
    Submission(String),

    #[error("Polling timed out. Please try again.")]
    PollTimeout {
        attempts: u32,
        last_error: Option<String>,
    },

    /// A submission or polling loop is already active.
    #[error("A job is already being submitted or processed")]
    Busy,

    /// Polling was requested for a job the controller is not waiting on.
    #[error("No job '{0}' is awaiting results")]
    NotPolling(String),

    /// The controller was reset while this operation was in flight.
    #[error("Job was reset before it finished")]
    Abandoned,

    /// The controller has been shut down and accepts no more work.
    #[error("Job controller has been shut down")]
    ShutDown,
}

impl JobError {
    pub fn no_files() -> Self {
        Self::Validation(NO_FILES_MESSAGE.to_string())
    }

    /// Whether this error moves the lifecycle into `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Submission(_) | Self::PollTimeout { .. } | Self::ShutDown
        )
    }
}
