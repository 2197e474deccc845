//! Error types for the backend abstraction layer.

use thiserror::Error;

/// Errors that can occur in backend operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Backend is not available.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// Backend is not registered.
    #[error("Backend not found: {0}")]
    BackendNotFound(String),

    /// Job submission failed.
    #[error("Job submission failed: {0}")]
    SubmissionFailed(String),

    /// Hardware-level execution error.
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Network/connection error talking to the execution service.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Job execution failed.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Job was cancelled.
    #[error("Job cancelled")]
    JobCancelled,

    /// Job not found.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Program exceeds backend capacity.
    #[error("Program too large for backend: {0}")]
    ProgramTooLarge(String),

    /// Invalid number of shots.
    #[error("Invalid shots: {0}")]
    InvalidShots(String),

    /// Timeout waiting for job.
    #[error("Timeout waiting for job {0}")]
    Timeout(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic backend error.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl HalError {
    /// Whether this error belongs to the transient infrastructure class
    /// that the execution engine's automatic retry covers. Everything
    /// else is treated as permanent for the current attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HalError::Hardware(_)
                | HalError::Connection(_)
                | HalError::SubmissionFailed(_)
                | HalError::BackendUnavailable(_)
                | HalError::Timeout(_)
        )
    }
}

/// Result type for backend operations.
pub type HalResult<T> = Result<T, HalError>;
