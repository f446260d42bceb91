use thiserror::Error;

use crate::backend::{BackendError, JobId};

#[derive(Debug, Error)]
pub enum OrderflowError {
    #[error("Invalid poll configuration: {0}")]
    InvalidPollConfig(String),

    #[error("Job {0} is already finished")]
    JobFinished(JobId),

    #[error("No processed file found for job {0} yet")]
    NoProcessedFile(JobId),

    #[error("Submission failed: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a chat export never made it into the polling loop.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Rejected locally before any network call.
    #[error("file rejected: {0}")]
    Rejected(String),

    #[error("upload failed: {0}")]
    Upload(#[source] BackendError),

    #[error("failed to start processing job {id}: {source}")]
    Trigger {
        id: JobId,
        #[source]
        source: BackendError,
    },
}

impl SubmissionError {
    /// `true` when the backend refused the session token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            SubmissionError::Upload(BackendError::Unauthorized)
                | SubmissionError::Trigger {
                    source: BackendError::Unauthorized,
                    ..
                }
        )
    }
}
