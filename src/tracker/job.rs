use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{JobId, StatusResponse};

/// Lifecycle status of a tracked processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Processing => write!(f, "PROCESSING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::TimedOut => write!(f, "TIMED_OUT"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Counts reported by the backend once a job is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub job_id: JobId,
    pub total_messages: u64,
    pub total_orders: u64,
}

impl ProcessingSummary {
    pub fn from_status(job_id: &JobId, status: &StatusResponse) -> Self {
        Self {
            job_id: job_id.clone(),
            total_messages: status.total_messages.unwrap_or(0),
            total_orders: status.total_orders.unwrap_or(0),
        }
    }
}

/// Terminal result of one polling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Completed(ProcessingSummary),
    /// The backend reported that processing itself failed.
    Failed(String),
    /// No terminal state after this many attempts.
    TimedOut(u32),
    /// Cancelled by the caller after this many status queries.
    Cancelled(u32),
}

impl Outcome {
    /// The job status this outcome leaves the job in.
    pub fn status(&self) -> JobStatus {
        match self {
            Outcome::Completed(_) => JobStatus::Completed,
            Outcome::Failed(_) => JobStatus::Failed,
            Outcome::TimedOut(_) => JobStatus::TimedOut,
            Outcome::Cancelled(_) => JobStatus::Cancelled,
        }
    }
}

/// Polling behavior for a single run.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait before each status query.
    pub poll_interval: Duration,
    /// Status queries allowed before giving up with `TimedOut`.
    pub max_attempts: u32,
    /// Upper bound on the progress fraction reported before completion.
    pub progress_cap: f64,
    /// Back off exponentially after consecutive inconclusive queries.
    pub transient_backoff: bool,
    /// Ceiling for the backed-off wait.
    pub max_poll_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            max_attempts: 60,
            progress_cap: 0.90,
            transient_backoff: false,
            max_poll_interval: Duration::from_secs(120),
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        if !(self.progress_cap > 0.0 && self.progress_cap <= 1.0) {
            return Err(format!(
                "progress_cap must be in (0, 1], got {}",
                self.progress_cap
            ));
        }
        Ok(())
    }

    /// Progress estimate for the given attempt: `min(attempt / max_attempts, progress_cap)`.
    pub fn progress_for(&self, attempt: u32) -> f64 {
        (f64::from(attempt) / f64::from(self.max_attempts)).min(self.progress_cap)
    }

    /// Wait before the next query, given how many queries in a row were inconclusive.
    /// delay = poll_interval * 2^failures, clamped to max_poll_interval
    pub fn delay_before(&self, consecutive_failures: u32) -> Duration {
        if !self.transient_backoff || consecutive_failures == 0 {
            return self.poll_interval;
        }
        let factor = 2u32.saturating_pow(consecutive_failures);
        self.poll_interval
            .saturating_mul(factor)
            .min(self.max_poll_interval)
            .max(self.poll_interval)
    }
}

/// A job submitted to the backend and tracked locally until it is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub file_name: Option<String>,
    pub status: JobStatus,
    pub status_history: Vec<JobStatus>,
    pub error: Option<String>,
    pub summary: Option<ProcessingSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, file_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            file_name,
            status: JobStatus::Pending,
            status_history: Vec::new(),
            error: None,
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Human-readable label: the uploaded file name, falling back to the id.
    pub fn label(&self) -> String {
        match &self.file_name {
            Some(name) => format!("{name} (#{})", self.id),
            None => format!("job #{}", self.id),
        }
    }
}

/// Snapshot taken at one poll attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollObservation {
    pub attempt: u32,
    pub max_attempts: u32,
    pub elapsed_ms: u64,
    pub progress: f64,
    pub status: JobStatus,
    /// Set when the status query failed and the attempt was inconclusive.
    pub error: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl PollObservation {
    pub fn is_inconclusive(&self) -> bool {
        self.error.is_some()
    }
}

/// Structured record produced at the end of a polling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub job_id: JobId,
    pub file_name: Option<String>,
    pub outcome: Outcome,
    pub status_transitions: Vec<JobStatus>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub observations: Vec<PollObservation>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunReport {
    /// Build the report for a job that has reached a terminal status.
    pub fn from_job(
        job: &Job,
        outcome: Outcome,
        attempts: u32,
        max_attempts: u32,
        observations: Vec<PollObservation>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        let mut transitions = job.status_history.clone();
        transitions.push(job.status);

        Self {
            run_id: Uuid::new_v4(),
            job_id: job.id.clone(),
            file_name: job.file_name.clone(),
            outcome,
            status_transitions: transitions,
            attempts,
            max_attempts,
            observations,
            started_at,
            finished_at: now,
            duration_ms: (now - started_at).num_milliseconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_creation_defaults() {
        let job = Job::new(JobId::new("1"), Some("chat.txt".into()));
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.status_history.is_empty());
        assert!(job.error.is_none());
        assert!(job.summary.is_none());
        assert_eq!(job.label(), "chat.txt (#1)");
    }

    #[test]
    fn default_poll_config() {
        let config = PollConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.max_attempts, 60);
        assert_eq!(config.progress_cap, 0.90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn progress_is_capped() {
        let config = PollConfig::default();
        assert_eq!(config.progress_for(1), 1.0 / 60.0);
        assert_eq!(config.progress_for(30), 0.5);
        assert_eq!(config.progress_for(54), 0.90);
        assert_eq!(config.progress_for(55), 0.90);
        assert_eq!(config.progress_for(60), 0.90);
    }

    #[test]
    fn invalid_poll_configs_are_rejected() {
        let zero_attempts = PollConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(zero_attempts.validate().is_err());

        let bad_cap = PollConfig {
            progress_cap: 1.5,
            ..Default::default()
        };
        assert!(bad_cap.validate().is_err());

        let nan_cap = PollConfig {
            progress_cap: f64::NAN,
            ..Default::default()
        };
        assert!(nan_cap.validate().is_err());
    }

    #[test]
    fn fixed_interval_without_backoff() {
        let config = PollConfig::default();
        assert_eq!(config.delay_before(0), Duration::from_secs(15));
        assert_eq!(config.delay_before(5), Duration::from_secs(15));
    }

    #[test]
    fn backoff_doubles_and_clamps() {
        let config = PollConfig {
            transient_backoff: true,
            ..Default::default()
        };
        assert_eq!(config.delay_before(0), Duration::from_secs(15));
        assert_eq!(config.delay_before(1), Duration::from_secs(30));
        assert_eq!(config.delay_before(2), Duration::from_secs(60));
        assert_eq!(config.delay_before(3), Duration::from_secs(120));
        assert_eq!(config.delay_before(40), Duration::from_secs(120));
    }

    #[test]
    fn outcome_maps_to_terminal_status() {
        assert_eq!(Outcome::Failed("x".into()).status(), JobStatus::Failed);
        assert_eq!(Outcome::TimedOut(60).status(), JobStatus::TimedOut);
        assert_eq!(Outcome::Cancelled(2).status(), JobStatus::Cancelled);
        assert!(Outcome::Cancelled(2).status().is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn report_records_final_status() {
        let mut job = Job::new(JobId::new("8"), None);
        job.status_history.push(JobStatus::Pending);
        job.status = JobStatus::TimedOut;

        let report = RunReport::from_job(&job, Outcome::TimedOut(3), 3, 3, Vec::new(), Utc::now());
        assert_eq!(report.job_id, JobId::new("8"));
        assert_eq!(
            report.status_transitions,
            vec![JobStatus::Pending, JobStatus::TimedOut]
        );
        assert!(report.duration_ms >= 0);
    }

    #[test]
    fn report_serializes_to_json() {
        let job = Job::new(JobId::new("8"), Some("a.txt".into()));
        let report = RunReport::from_job(&job, Outcome::Cancelled(0), 0, 60, Vec::new(), Utc::now());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""job_id":"8""#));
        assert!(json.contains(r#""Cancelled":0"#));
    }
}
