//! Molecular complexity estimation.
//!
//! A scalar proxy for computational cost, derived from structure size
//! and basis level. The selector scores backends against it; nothing
//! here claims chemical accuracy. Calibration mirrors what worked in
//! practice: atom count times a small basis-level multiplier.

use serde::{Deserialize, Serialize};

use crate::molecule::MoleculeSpec;

/// Complexity proxy for one molecule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityEstimate {
    /// Number of atoms in the geometry.
    pub atoms: u32,
    /// Basis-level multiplier (1 = minimal, 4 = triple-zeta).
    pub basis_level: u32,
    /// `atoms * basis_level`.
    pub total: u32,
    /// Spatial orbitals the problem needs: `max(4, atoms * 2)`.
    pub num_orbitals: u32,
    /// Qubits the prepared program will need: `2 * num_orbitals`.
    pub qubits_needed: u32,
    /// Rough circuit depth estimate: `total * 20`.
    pub depth_estimate: u32,
}

/// Basis-level multiplier for a basis-set name. Unknown basis sets get
/// the minimal level.
fn basis_level(basis: &str) -> u32 {
    let basis = basis.to_ascii_lowercase();
    if basis.contains("cc-pvtz") {
        4
    } else if basis.contains("cc-pvdz") {
        3
    } else if basis.contains("6-31g") {
        2
    } else {
        1
    }
}

impl ComplexityEstimate {
    /// Estimate complexity for a molecule spec.
    pub fn for_molecule(spec: &MoleculeSpec) -> Self {
        let atoms = spec.num_atoms() as u32;
        let basis_level = basis_level(&spec.basis);
        let total = atoms * basis_level;
        let num_orbitals = (atoms * 2).max(4);
        let qubits_needed = num_orbitals * 2;
        let depth_estimate = total * 20;

        Self {
            atoms,
            basis_level,
            total,
            num_orbitals,
            qubits_needed,
            depth_estimate,
        }
    }
}
