use chrono::Utc;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::backend::{JobBackend, Upload};
use crate::error::{OrderflowError, SubmissionError};
use crate::tracker::{
    Job, Outcome, PollConfig, PollObservation, PollResult, RunReport, StatusMachine, Transition,
};

/// Receives each non-terminal poll observation. Must return quickly.
pub trait ProgressObserver {
    fn observe(&mut self, observation: &PollObservation);
}

impl<F: FnMut(&PollObservation)> ProgressObserver for F {
    fn observe(&mut self, observation: &PollObservation) {
        self(observation)
    }
}

/// Local checks applied to a file before it is uploaded.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            allowed_extensions: vec!["txt".to_string()],
        }
    }
}

impl UploadPolicy {
    pub fn check(&self, upload: &Upload) -> Result<(), SubmissionError> {
        if upload.bytes.is_empty() {
            return Err(SubmissionError::Rejected(format!(
                "{} is empty",
                upload.file_name
            )));
        }

        let size = upload.bytes.len() as u64;
        if size > self.max_file_size {
            return Err(SubmissionError::Rejected(format!(
                "{} is {size} bytes, the limit is {} bytes",
                upload.file_name, self.max_file_size
            )));
        }

        if !self.allowed_extensions.is_empty() {
            let ext = upload.extension().unwrap_or_default();
            if !self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
            {
                return Err(SubmissionError::Rejected(format!(
                    "{} must have one of the extensions: {}",
                    upload.file_name,
                    self.allowed_extensions.join(", ")
                )));
            }
        }

        Ok(())
    }
}

/// Submits chat exports and polls them to a terminal outcome.
pub struct JobOrchestrator<B> {
    backend: B,
    policy: UploadPolicy,
}

impl<B: JobBackend> JobOrchestrator<B> {
    pub fn new(backend: B, policy: UploadPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Validate, upload and start processing a file.
    ///
    /// On success the returned job is `Pending`. Any error here means the
    /// caller must not poll.
    pub async fn submit(&self, upload: &Upload) -> Result<Job, SubmissionError> {
        self.policy.check(upload)?;

        let id = self
            .backend
            .upload(upload)
            .await
            .map_err(SubmissionError::Upload)?;
        tracing::info!(job_id = %id, file = %upload.file_name, bytes = upload.bytes.len(), "Uploaded chat file");

        if let Err(source) = self.backend.trigger_processing(&id).await {
            tracing::error!(job_id = %id, error = %source, "Failed to start processing");
            return Err(SubmissionError::Trigger { id, source });
        }
        tracing::info!(job_id = %id, "Processing started");

        Ok(Job::new(id, Some(upload.file_name.clone())))
    }

    /// Poll the job until it completes, fails, runs out of attempts or is cancelled.
    ///
    /// Each attempt waits first, then queries the status. Failed queries
    /// still count as attempts. Terminal attempts emit no observation.
    pub async fn run(
        &self,
        job: &mut Job,
        config: &PollConfig,
        observer: &mut impl ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<RunReport, OrderflowError> {
        config.validate().map_err(OrderflowError::InvalidPollConfig)?;
        if job.status.is_terminal() {
            return Err(OrderflowError::JobFinished(job.id.clone()));
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        let mut observations = Vec::new();
        let mut attempt = 0u32;
        let mut consecutive_failures = 0u32;

        let outcome = loop {
            if attempt >= config.max_attempts {
                break Outcome::TimedOut(attempt);
            }
            if cancel.is_cancelled() {
                break Outcome::Cancelled(attempt);
            }

            let delay = config.delay_before(consecutive_failures);
            let interrupted = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = sleep(delay) => false,
            };
            if interrupted {
                break Outcome::Cancelled(attempt);
            }

            attempt += 1;
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.backend.fetch_status(&job.id) => Some(result),
            };
            let Some(response) = response else {
                break Outcome::Cancelled(attempt);
            };

            let result = match response {
                Ok(status) => PollResult::Status(status),
                Err(e) => {
                    tracing::info!(
                        job_id = %job.id,
                        attempt,
                        timeout = e.is_timeout(),
                        error = %e,
                        "Status query inconclusive"
                    );
                    PollResult::Inconclusive(e.to_string())
                }
            };

            match StatusMachine::evaluate(job, &result) {
                Transition::Complete(outcome) => break outcome,
                Transition::AlreadyTerminal(_) => {
                    return Err(OrderflowError::JobFinished(job.id.clone()));
                }
                Transition::Continue => {
                    let error = match result {
                        PollResult::Inconclusive(message) => {
                            consecutive_failures += 1;
                            Some(message)
                        }
                        PollResult::Status(_) => {
                            consecutive_failures = 0;
                            None
                        }
                    };
                    let observation = PollObservation {
                        attempt,
                        max_attempts: config.max_attempts,
                        elapsed_ms: clock.elapsed().as_millis() as u64,
                        progress: config.progress_for(attempt),
                        status: job.status,
                        error,
                        observed_at: Utc::now(),
                    };
                    tracing::debug!(
                        job_id = %job.id,
                        attempt,
                        progress = observation.progress,
                        status = %job.status,
                        "Job still running"
                    );
                    observer.observe(&observation);
                    observations.push(observation);
                }
            }
        };

        StatusMachine::conclude(job, &outcome);
        tracing::info!(job_id = %job.id, attempts = attempt, status = %job.status, "Polling finished");

        Ok(RunReport::from_job(
            job,
            outcome,
            attempt,
            config.max_attempts,
            observations,
            started_at,
        ))
    }
}
