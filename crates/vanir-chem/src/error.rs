//! Error types for molecule handling and collaborator calls.

use thiserror::Error;

/// Errors from molecule parsing and chemistry collaborators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChemError {
    /// Molecule input file could not be parsed.
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// Structure derivation failed (geometry/basis/integrals).
    #[error("Chemistry error for {molecule}: {message}")]
    Chemistry { molecule: String, message: String },

    /// Program construction or circuit optimization failed.
    #[error("Optimization error for {molecule}: {message}")]
    Optimization { molecule: String, message: String },

    /// The kernel observed sampled indices inconsistent with the basis:
    /// basis too small or frozen-orbital count mismatched. This is the
    /// only error class that triggers the basis-set fallback.
    #[error("Basis mismatch for {molecule}: {message}")]
    BasisMismatch { molecule: String, message: String },

    /// Numerical failure inside the iteration kernel.
    #[error("Numeric error for {molecule}: {message}")]
    Numeric { molecule: String, message: String },

    /// IO error reading molecule input.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChemError {
    /// Whether this error should trigger the basis-set downgrade rather
    /// than a same-basis retry. Kept as an explicit classification so
    /// the fallback boundary is a decision, not a catch-all.
    pub fn is_basis_mismatch(&self) -> bool {
        matches!(self, ChemError::BasisMismatch { .. })
    }
}

/// Result type for chemistry operations.
pub type ChemResult<T> = Result<T, ChemError>;
