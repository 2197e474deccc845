//! Error handling for the batch orchestration layer.

use thiserror::Error;

/// Result type for orchestration operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur during batch orchestration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchedError {
    /// No registered backend can hold the molecule's program.
    #[error("No candidate backend for {molecule}: {reason}")]
    NoCandidateBackend { molecule: String, reason: String },

    /// Hardware submission failed and the simulator fallback also
    /// failed. Terminal for the molecule's preparation.
    #[error("Execution failed terminally for {molecule}: {reason}")]
    ExecutionTerminal { molecule: String, reason: String },

    /// Both the primary basis and the fallback basis failed with the
    /// basis-mismatch error class. Terminal for the molecule.
    #[error("Basis fallback failed for {molecule}: fallback basis {fallback_basis} also mismatched")]
    BasisFallbackFailed {
        molecule: String,
        fallback_basis: String,
    },

    /// Backend layer error.
    #[error("Backend error: {0}")]
    Hal(#[from] vanir_hal::HalError),

    /// Chemistry collaborator error.
    #[error("Chemistry error: {0}")]
    Chem(#[from] vanir_chem::ChemError),

    /// Reliability policy error (retry exhaustion, checkpoint issues).
    #[error("Policy error: {0}")]
    Policy(#[from] vanir_policy::PolicyError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchedError {
    /// Whether this error is the basis-mismatch class that triggers the
    /// basis-set fallback.
    pub fn is_basis_mismatch(&self) -> bool {
        matches!(self, SchedError::Chem(e) if e.is_basis_mismatch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedError::NoCandidateBackend {
            molecule: "h2o".into(),
            reason: "needs 28 qubits".into(),
        };
        assert_eq!(
            err.to_string(),
            "No candidate backend for h2o: needs 28 qubits"
        );
    }

    #[test]
    fn test_basis_mismatch_passthrough() {
        let err = SchedError::Chem(vanir_chem::ChemError::BasisMismatch {
            molecule: "h2o".into(),
            message: "index out of range".into(),
        });
        assert!(err.is_basis_mismatch());

        let err = SchedError::ExecutionTerminal {
            molecule: "h2o".into(),
            reason: "simulator offline".into(),
        };
        assert!(!err.is_basis_mismatch());
    }
}
