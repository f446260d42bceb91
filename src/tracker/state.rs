use chrono::Utc;

use super::job::{Job, JobStatus, Outcome, ProcessingSummary};
use crate::backend::StatusResponse;

/// What a single poll attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    /// The backend answered with the job's current state.
    Status(StatusResponse),
    /// The query failed; the job state is unknown for this attempt.
    Inconclusive(String),
}

/// The result of evaluating one poll attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The job is still running; keep polling.
    Continue,
    /// The job reached a terminal state.
    Complete(Outcome),
    /// The job was already terminal before this result; nothing changed.
    AlreadyTerminal(JobStatus),
}

/// Drives a `Job` through its status lifecycle.
///
/// Pending -> Processing -> {Completed, Failed}; any non-terminal status can
/// also end as TimedOut or Cancelled via [`StatusMachine::conclude`].
pub struct StatusMachine;

impl StatusMachine {
    /// Apply one poll result to the job and decide whether polling continues.
    ///
    /// Completion is checked before the processing error, and both before
    /// anything else, so a terminal answer always wins over progress.
    /// A terminal job is never moved again.
    pub fn evaluate(job: &mut Job, result: &PollResult) -> Transition {
        if job.status.is_terminal() {
            return Transition::AlreadyTerminal(job.status);
        }

        match result {
            PollResult::Status(status) if status.is_processed => {
                let summary = ProcessingSummary::from_status(&job.id, status);
                job.summary = Some(summary.clone());
                Self::advance(job, JobStatus::Completed);
                Transition::Complete(Outcome::Completed(summary))
            }
            PollResult::Status(status) => match status.error_message() {
                Some(reason) => {
                    job.error = Some(reason.to_string());
                    Self::advance(job, JobStatus::Failed);
                    Transition::Complete(Outcome::Failed(reason.to_string()))
                }
                None => {
                    Self::advance(job, JobStatus::Processing);
                    Transition::Continue
                }
            },
            // Unknown state: leave the job where it was.
            PollResult::Inconclusive(_) => Transition::Continue,
        }
    }

    /// Move the job into the terminal status of an outcome decided outside
    /// `evaluate` (timeout, cancellation). No-op for an already terminal job.
    pub fn conclude(job: &mut Job, outcome: &Outcome) {
        if !job.status.is_terminal() {
            Self::advance(job, outcome.status());
        }
    }

    fn advance(job: &mut Job, next: JobStatus) {
        if job.status != next {
            job.status_history.push(job.status);
            job.status = next;
            job.updated_at = Utc::now();
        }
    }
}
