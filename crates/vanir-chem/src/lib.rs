//! Molecule model and chemistry collaborator seams.
//!
//! Vanir does not do chemistry: structure derivation, circuit
//! construction, and the sample-based diagonalization kernel all live
//! behind the narrow traits in [`collab`]. What this crate owns is the
//! molecule input format, the complexity proxy the scheduler scores
//! with, and the solver-state type that checkpoints carry.

pub mod collab;
pub mod complexity;
pub mod error;
pub mod loader;
pub mod molecule;

pub use collab::{ProgramBuilder, SolverState, SqdKernel, StructureBuilder, StructureHandle};
pub use complexity::ComplexityEstimate;
pub use error::{ChemError, ChemResult};
pub use loader::{load_compound_dir, load_molecule, CompoundLoad};
pub use molecule::{Atom, MoleculeSpec};
