pub mod client;
pub mod error;
pub mod session;
pub mod types;

pub use client::{BackendClient, JobBackend, Timeouts};
pub use error::BackendError;
pub use session::Session;
pub use types::{JobId, ProcessedFile, StatusResponse, Upload};
