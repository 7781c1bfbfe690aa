//! Job lifecycle controller.
//!
//! [`JobController`] owns the single current job: it submits a batch of
//! files, runs the bounded poll loop, and keeps an immutable
//! [`LifecycleState`] snapshot that only moves through
//! [`ocrjob_core::lifecycle::transition`].
//!
//! Every mutation that originates from an in-flight request or poll loop is
//! tagged with the generation it started under. [`JobController::reset`]
//! bumps the generation and cancels the current [`CancellationToken`], so a
//! stale loop can neither keep running nor write into the new state.
//!
//! Lifecycle events are broadcast via a [`tokio::sync::broadcast`] channel.
//! Call [`JobController::subscribe`] to receive them.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ocrjob_core::error::JobError;
use ocrjob_core::lifecycle::{transition, LifecycleEvent, LifecycleState, Phase};
use ocrjob_core::poll::{AttemptOutcome, PollPolicy};
use ocrjob_core::types::{FileBlob, JobId};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::api::JobService;
use crate::events::{JobEvent, JobEventKind};
use crate::poller::{self, PollError, PollSuccess};

/// Broadcast channel capacity for lifecycle events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Drives one job at a time against a [`JobService`].
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct JobController<S: ?Sized> {
    service: Arc<S>,
    policy: PollPolicy,
    state: RwLock<LifecycleState>,
    /// Master token; every cycle runs under a child of it.
    cancel: CancellationToken,
    /// Token for the current generation, replaced on every reset.
    current: Mutex<CancellationToken>,
    event_tx: broadcast::Sender<JobEvent>,
}

impl<S> JobController<S>
where
    S: JobService + ?Sized,
{
    pub fn new(service: Arc<S>, policy: PollPolicy) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let current = Mutex::new(cancel.child_token());

        Self {
            service,
            policy,
            state: RwLock::new(LifecycleState::default()),
            cancel,
            current,
            event_tx,
        }
    }

    /// Current immutable snapshot.
    pub fn snapshot(&self) -> LifecycleState {
        self.read_state().clone()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Stage files for the next [`submit_selected`](Self::submit_selected),
    /// clearing any previous job, result or error.
    pub fn select_files(&self, files: Vec<FileBlob>) -> Result<(), JobError> {
        let mut state = self.write_state();
        let next = transition(&state, LifecycleEvent::FilesSelected(files.into()))
            .map_err(|_| JobError::Busy)?;
        tracing::debug!(file_count = next.files.len(), "Files selected");
        *state = next;
        Ok(())
    }

    /// Submit `files` as one job. Returns the service-assigned id and
    /// leaves the controller in `Polling`.
    pub async fn submit(&self, files: Vec<FileBlob>) -> Result<JobId, JobError> {
        self.start_submission(Some(files)).await
    }

    /// Submit whatever was staged with [`select_files`](Self::select_files).
    pub async fn submit_selected(&self) -> Result<JobId, JobError> {
        self.start_submission(None).await
    }

    /// Poll a submitted job until it reaches a terminal state, returning
    /// the summary body verbatim.
    pub async fn poll_until_terminal(&self, job_id: &JobId) -> Result<serde_json::Value, JobError> {
        let (generation, cancel) = {
            let mut state = self.write_state();
            if self.cancel.is_cancelled() {
                return Err(JobError::ShutDown);
            }
            if state.phase != Phase::Polling || state.job_id.as_ref() != Some(job_id) {
                return Err(JobError::NotPolling(job_id.to_string()));
            }
            *state = transition(&state, LifecycleEvent::PollStarted).map_err(|_| JobError::Busy)?;
            (state.generation, self.current_token())
        };

        tracing::info!(
            job_id = %job_id,
            max_attempts = self.policy.max_attempts,
            interval_ms = self.policy.interval.as_millis() as u64,
            "Polling job",
        );

        let outcome = poller::poll_until_terminal(
            self.service.as_ref(),
            job_id,
            &self.policy,
            &cancel,
            |attempt, outcome| self.record_attempt(generation, job_id, attempt, outcome),
        )
        .await;

        match outcome {
            Ok(PollSuccess { result, attempts }) => {
                let event = LifecycleEvent::Completed {
                    result: result.clone(),
                };
                if !self.apply(generation, event) {
                    return Err(JobError::Abandoned);
                }
                self.emit(JobEventKind::Completed {
                    job_id: job_id.clone(),
                    attempts,
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(PollError::TimedOut {
                attempts,
                last_error,
            }) => self.fail(
                generation,
                JobError::PollTimeout {
                    attempts,
                    last_error,
                },
            ),
            Err(PollError::Cancelled { .. }) => self.interrupted(generation),
        }
    }

    /// Submit `files` and wait for the terminal result.
    pub async fn run(&self, files: Vec<FileBlob>) -> Result<serde_json::Value, JobError> {
        let job_id = self.submit(files).await?;
        self.poll_until_terminal(&job_id).await
    }

    /// Drop the current job and return to `Idle`.
    ///
    /// Any in-flight submission or poll loop is cancelled and can no longer
    /// change state. Nothing is sent to the service.
    pub fn reset(&self) {
        let mut state = self.write_state();
        match transition(&state, LifecycleEvent::Reset) {
            Ok(next) => *state = next,
            Err(e) => {
                tracing::error!(error = %e, "Reset rejected");
                return;
            }
        }

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = self.cancel.child_token();

        tracing::info!(generation = state.generation, "Controller reset");
        drop(current);
        drop(state);

        self.emit(JobEventKind::Reset);
    }

    /// Cancel every in-flight operation for good.
    ///
    /// An interrupted submission or poll loop ends in `Failed`; later calls
    /// are rejected with [`JobError::ShutDown`].
    pub fn shutdown(&self) {
        tracing::info!("Shutting down job controller");
        self.cancel.cancel();
    }

    // ---- private helpers ----

    async fn start_submission(&self, files: Option<Vec<FileBlob>>) -> Result<JobId, JobError> {
        let (generation, files, cancel) = {
            let mut state = self.write_state();
            if self.cancel.is_cancelled() {
                return Err(JobError::ShutDown);
            }
            if state.phase.is_busy() {
                return Err(JobError::Busy);
            }

            let staged = match files {
                Some(files) => transition(&state, LifecycleEvent::FilesSelected(files.into()))
                    .map_err(|_| JobError::Busy)?,
                None => state.clone(),
            };

            if staged.files.is_empty() {
                let error = JobError::no_files();
                tracing::warn!("Submission rejected: no files selected");
                return self.fail_locked(&mut state, &staged, error);
            }

            *state = transition(&staged, LifecycleEvent::SubmitStarted).map_err(|_| JobError::Busy)?;
            (state.generation, Arc::clone(&state.files), self.current_token())
        };

        tracing::info!(file_count = files.len(), "Submitting job");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.interrupted(generation),
            response = self.service.submit_job(&files) => response,
        };

        match response {
            Ok(job_id) => {
                let event = LifecycleEvent::SubmitSucceeded {
                    job_id: job_id.clone(),
                };
                if !self.apply(generation, event) {
                    return Err(JobError::Abandoned);
                }
                tracing::info!(job_id = %job_id, "Job submitted");
                self.emit(JobEventKind::Submitted {
                    job_id: job_id.clone(),
                    file_count: files.len(),
                });
                Ok(job_id)
            }
            Err(e) => {
                tracing::error!(error = %e, "Job submission failed");
                self.fail(generation, JobError::Submission(e.summary()))
            }
        }
    }

    /// Outcome for an operation whose token fired: a reset abandons it,
    /// a shutdown fails it.
    fn interrupted<T>(&self, generation: u64) -> Result<T, JobError> {
        if self.cancel.is_cancelled() {
            self.fail(generation, JobError::ShutDown)
        } else {
            Err(JobError::Abandoned)
        }
    }

    /// Fold one poll attempt into the snapshot and publish it.
    fn record_attempt(&self, generation: u64, job_id: &JobId, attempt: u32, outcome: &AttemptOutcome) {
        let (sub_state, error) = match outcome {
            AttemptOutcome::InProgress { sub_state } => (Some(sub_state.clone()), None),
            AttemptOutcome::Retry { error } => (None, Some(error.clone())),
            AttemptOutcome::Terminal { .. } => (None, None),
        };

        let event = LifecycleEvent::PollAttempted {
            attempt,
            sub_state: sub_state.clone(),
            error: error.clone(),
        };
        if !self.apply(generation, event) {
            return;
        }

        if let Some(sub_state) = sub_state {
            self.emit(JobEventKind::PollProgress {
                job_id: job_id.clone(),
                attempt,
                sub_state,
            });
        } else if let Some(error) = error {
            self.emit(JobEventKind::PollAttemptFailed {
                job_id: job_id.clone(),
                attempt,
                error,
            });
        }
    }

    /// Apply `event` if `generation` is still current. Returns whether the
    /// state changed.
    fn apply(&self, generation: u64, event: LifecycleEvent) -> bool {
        let mut state = self.write_state();
        if state.generation != generation {
            tracing::debug!(
                event = event.name(),
                stale_generation = generation,
                generation = state.generation,
                "Dropping event from a reset cycle",
            );
            return false;
        }

        match transition(&state, event) {
            Ok(next) => {
                *state = next;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejected lifecycle transition");
                false
            }
        }
    }

    /// Move to `Failed` with `error` if `generation` is still current.
    fn fail<T>(&self, generation: u64, error: JobError) -> Result<T, JobError> {
        let mut state = self.write_state();
        if state.generation != generation {
            return Err(JobError::Abandoned);
        }
        let current = state.clone();
        self.fail_locked(&mut state, &current, error)
    }

    fn fail_locked<T>(
        &self,
        state: &mut LifecycleState,
        from: &LifecycleState,
        error: JobError,
    ) -> Result<T, JobError> {
        if !error.is_terminal() {
            return Err(error);
        }
        let message = error.to_string();
        match transition(from, LifecycleEvent::Failed { error: message.clone() }) {
            Ok(next) => *state = next,
            Err(e) => tracing::warn!(error = %e, "Rejected lifecycle transition"),
        }
        tracing::error!(job_id = ?state.job_id, error = %message, "Job failed");
        self.emit(JobEventKind::Failed {
            job_id: state.job_id.clone(),
            error: message,
        });
        Err(error)
    }

    fn current_token(&self) -> CancellationToken {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn emit(&self, kind: JobEventKind) {
        // Zero receivers is not an error.
        let _ = self.event_tx.send(kind.into());
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LifecycleState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LifecycleState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
