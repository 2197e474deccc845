//! Opaque prepared-program handles.
//!
//! Program construction and circuit-level optimization happen in an
//! external collaborator. Vanir only carries the resulting handle from
//! the preparation phase to submission, so the handle records identity
//! and placement metadata rather than circuit contents.

use serde::{Deserialize, Serialize};

/// An executable program prepared for a specific backend.
///
/// Created once during preparation and never mutated afterwards; the
/// same handle is resubmitted verbatim on backend fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramHandle {
    /// Identifier of the prepared program (unique per molecule per run).
    pub program_id: String,
    /// Backend the program was optimized for.
    pub target_backend: String,
    /// Number of qubits the program uses.
    pub num_qubits: u32,
    /// Estimated circuit depth after optimization.
    pub depth_estimate: u32,
    /// Optimization level applied by the program builder.
    pub optimization_level: u8,
    /// Qubit layout tag assigned by the optimizer.
    pub layout_tag: Option<String>,
}

impl ProgramHandle {
    /// Create a new program handle.
    pub fn new(
        program_id: impl Into<String>,
        target_backend: impl Into<String>,
        num_qubits: u32,
    ) -> Self {
        Self {
            program_id: program_id.into(),
            target_backend: target_backend.into(),
            num_qubits,
            depth_estimate: 0,
            optimization_level: 0,
            layout_tag: None,
        }
    }

    /// Set the estimated depth.
    pub fn with_depth_estimate(mut self, depth: u32) -> Self {
        self.depth_estimate = depth;
        self
    }

    /// Set the optimization level.
    pub fn with_optimization_level(mut self, level: u8) -> Self {
        self.optimization_level = level;
        self
    }

    /// Set the qubit layout tag.
    pub fn with_layout_tag(mut self, tag: impl Into<String>) -> Self {
        self.layout_tag = Some(tag.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_handle_builders() {
        let program = ProgramHandle::new("h2o-prog", "ibm_torino", 28)
            .with_depth_estimate(240)
            .with_optimization_level(3)
            .with_layout_tag("zigzag");

        assert_eq!(program.program_id, "h2o-prog");
        assert_eq!(program.num_qubits, 28);
        assert_eq!(program.optimization_level, 3);
        assert_eq!(program.layout_tag.as_deref(), Some("zigzag"));
    }
}
