//! Job lifecycle state and its pure reducer.
//!
//! [`LifecycleState`] is an immutable snapshot. The only way to move it
//! forward is [`transition`], which maps `(state, event)` to a new state or
//! rejects the pair with a [`TransitionError`]. Nothing here performs I/O,
//! so every rule can be unit tested directly.
//!
//! ```text
//! Idle -> Submitting -> Polling -> Complete
//!             |            |
//!             +------------+-----> Failed
//! ```

use std::fmt;
use std::sync::Arc;

use crate::types::{FileBlob, JobId};

/// Coarse lifecycle phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Polling,
    Complete,
    Failed,
}

impl Phase {
    /// Submitting or Polling; a new submission must be rejected.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Submitting | Self::Polling)
    }

    /// Whether a new cycle may start from this phase.
    pub fn accepts_new_job(self) -> bool {
        !self.is_busy()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Polling => "polling",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observability data for the running (or last) polling loop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollProgress {
    /// Number of summary requests made so far.
    pub attempts: u32,
    /// Last in-progress state reported by the service.
    pub sub_state: Option<String>,
    /// Text of the most recent failed attempt, if any.
    pub last_error: Option<String>,
}

/// Immutable snapshot of the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleState {
    /// Bumped by every reset. Loop-originated events carry the generation
    /// they started under and are dropped once it no longer matches.
    pub generation: u64,
    pub phase: Phase,
    pub files: Arc<[FileBlob]>,
    pub job_id: Option<JobId>,
    pub poll: PollProgress,
    pub poll_loop_running: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: Phase::Idle,
            files: Arc::from(Vec::new()),
            job_id: None,
            poll: PollProgress::default(),
            poll_loop_running: false,
            result: None,
            error: None,
        }
    }
}

/// Inputs to [`transition`].
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    FilesSelected(Arc<[FileBlob]>),
    SubmitStarted,
    SubmitSucceeded { job_id: JobId },
    PollStarted,
    PollAttempted {
        attempt: u32,
        sub_state: Option<String>,
        error: Option<String>,
    },
    Completed { result: serde_json::Value },
    Failed { error: String },
    Reset,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FilesSelected(_) => "files_selected",
            Self::SubmitStarted => "submit_started",
            Self::SubmitSucceeded { .. } => "submit_succeeded",
            Self::PollStarted => "poll_started",
            Self::PollAttempted { .. } => "poll_attempted",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Reset => "reset",
        }
    }
}

/// A `(state, event)` pair the lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("event '{event}' is not allowed while {phase}")]
    Illegal { phase: Phase, event: &'static str },

    #[error("poll attempt {attempt} does not follow attempt {recorded}")]
    AttemptOutOfOrder { attempt: u32, recorded: u32 },
}

/// Apply one event to a state, producing the next state.
pub fn transition(
    state: &LifecycleState,
    event: LifecycleEvent,
) -> Result<LifecycleState, TransitionError> {
    let illegal = |event: &LifecycleEvent| TransitionError::Illegal {
        phase: state.phase,
        event: event.name(),
    };

    match event {
        LifecycleEvent::FilesSelected(files) if state.phase.accepts_new_job() => {
            Ok(LifecycleState {
                generation: state.generation,
                files,
                ..LifecycleState::default()
            })
        }

        LifecycleEvent::SubmitStarted if state.phase.accepts_new_job() => Ok(LifecycleState {
            generation: state.generation,
            phase: Phase::Submitting,
            files: Arc::clone(&state.files),
            ..LifecycleState::default()
        }),

        LifecycleEvent::SubmitSucceeded { job_id } if state.phase == Phase::Submitting => {
            Ok(LifecycleState {
                phase: Phase::Polling,
                job_id: Some(job_id),
                ..state.clone()
            })
        }

        LifecycleEvent::PollStarted
            if state.phase == Phase::Polling && !state.poll_loop_running =>
        {
            Ok(LifecycleState {
                poll_loop_running: true,
                ..state.clone()
            })
        }

        LifecycleEvent::PollAttempted {
            attempt,
            sub_state,
            error,
        } if state.phase == Phase::Polling => {
            if attempt <= state.poll.attempts {
                return Err(TransitionError::AttemptOutOfOrder {
                    attempt,
                    recorded: state.poll.attempts,
                });
            }
            Ok(LifecycleState {
                poll: PollProgress {
                    attempts: attempt,
                    sub_state: sub_state.or_else(|| state.poll.sub_state.clone()),
                    last_error: error.or_else(|| state.poll.last_error.clone()),
                },
                ..state.clone()
            })
        }

        LifecycleEvent::Completed { result } if state.phase == Phase::Polling => {
            Ok(LifecycleState {
                phase: Phase::Complete,
                poll_loop_running: false,
                result: Some(result),
                error: None,
                ..state.clone()
            })
        }

        LifecycleEvent::Failed { error } => {
            if state.phase.is_busy() {
                Ok(LifecycleState {
                    phase: Phase::Failed,
                    poll_loop_running: false,
                    result: None,
                    error: Some(error),
                    ..state.clone()
                })
            } else {
                // Failure before anything was sent starts a fresh cycle.
                Ok(LifecycleState {
                    generation: state.generation,
                    phase: Phase::Failed,
                    files: Arc::clone(&state.files),
                    error: Some(error),
                    ..LifecycleState::default()
                })
            }
        }

        LifecycleEvent::Reset => Ok(LifecycleState {
            generation: state.generation + 1,
            ..LifecycleState::default()
        }),

        other => Err(illegal(&other)),
    }
}
