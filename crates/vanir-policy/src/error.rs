//! Error types for policy combinators.

use thiserror::Error;

/// Errors that can occur in policy operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// Every allowed attempt failed.
    #[error("All {attempts} attempts failed, last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Persisted checkpoint was written by an incompatible version.
    #[error("Checkpoint version mismatch for {key}: found {found}, expected {expected}")]
    CheckpointVersion { key: String, found: u32, expected: u32 },

    /// Persisted checkpoint exists but cannot be decoded.
    #[error("Corrupt checkpoint for {key}: {message}")]
    CheckpointCorrupt { key: String, message: String },

    /// IO error against the backing store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
