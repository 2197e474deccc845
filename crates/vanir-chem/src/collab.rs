//! Collaborator seams for the external chemistry stack.
//!
//! Structure derivation, program construction, and the sample-based
//! diagonalization kernel are external services from the orchestrator's
//! point of view. These traits are the narrow interfaces it consumes;
//! test doubles and the reference adapters implement them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vanir_hal::{BackendDescriptor, ProgramHandle, SampleData};

use crate::error::ChemResult;
use crate::molecule::MoleculeSpec;

/// Computational structure derived from a molecule: orbitals, electron
/// counts, and the integral data the kernel consumes (held externally,
/// referenced by the molecule id + basis pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureHandle {
    /// Molecule this structure was derived from.
    pub molecule_id: String,
    /// Basis set actually used.
    pub basis: String,
    /// Number of spatial orbitals.
    pub num_orbitals: u32,
    /// Alpha/beta electron counts.
    pub num_electrons: (u32, u32),
    /// Nuclear repulsion energy offset.
    pub nuclear_repulsion_energy: f64,
    /// Frozen-orbital count carried from the molecule definition.
    pub n_frozen: Option<u32>,
}

impl StructureHandle {
    /// Qubits a program over this structure needs.
    pub fn qubits_needed(&self) -> u32 {
        self.num_orbitals * 2
    }
}

/// Intermediate or final state of the iterative solver.
///
/// This is the payload the checkpoint store persists after every
/// iteration, so it must stay serializable and self-contained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverState {
    /// Completed iterations.
    pub iteration: u32,
    /// Electronic energy after the last iteration (no nuclear offset).
    pub energy: f64,
    /// Orbital occupancy estimates carried between iterations.
    pub occupancies: Vec<f64>,
}

impl SolverState {
    /// Initial state before any iteration.
    pub fn initial(num_orbitals: u32) -> Self {
        Self {
            iteration: 0,
            energy: 0.0,
            occupancies: vec![0.0; num_orbitals as usize],
        }
    }
}

/// Derives the computational structure for a molecule.
#[async_trait]
pub trait StructureBuilder: Send + Sync {
    /// Build the structure (geometry interpretation, basis application,
    /// integral derivation) for a molecule spec.
    async fn build_structure(&self, spec: &MoleculeSpec) -> ChemResult<StructureHandle>;
}

/// Builds and optimizes the executable program for a target backend.
#[async_trait]
pub trait ProgramBuilder: Send + Sync {
    /// Build a program for the structure, targeted and optimized for
    /// the given backend.
    async fn build_program(
        &self,
        structure: &StructureHandle,
        backend: &BackendDescriptor,
        reps: u32,
        opt_level: u8,
    ) -> ChemResult<ProgramHandle>;
}

/// The sample-based diagonalization iteration kernel.
///
/// # Contract
///
/// One call advances at most one iteration. `prior` is `None` on the
/// first call; a returned state with `converged == false` is fed back
/// on the next call. The kernel MUST treat a non-empty prior state as
/// "continue from there", never as "restart" — resumability depends on
/// it.
#[async_trait]
pub trait SqdKernel: Send + Sync {
    /// Advance the solver by one iteration.
    async fn iterate(
        &self,
        structure: &StructureHandle,
        prior: Option<&SolverState>,
        samples: &SampleData,
        energy_tol: f64,
    ) -> ChemResult<(SolverState, bool)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_qubits() {
        let structure = StructureHandle {
            molecule_id: "h2".into(),
            basis: "sto-3g".into(),
            num_orbitals: 4,
            num_electrons: (1, 1),
            nuclear_repulsion_energy: 0.715,
            n_frozen: None,
        };
        assert_eq!(structure.qubits_needed(), 8);
    }

    #[test]
    fn test_initial_state() {
        let state = SolverState::initial(6);
        assert_eq!(state.iteration, 0);
        assert_eq!(state.occupancies.len(), 6);
    }
}
