//! Molecule specifications.

use serde::{Deserialize, Serialize};

/// One atom in a molecular geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Element symbol (e.g. "H", "O", "Li").
    pub element: String,
    /// Cartesian position in angstroms.
    pub position: [f64; 3],
}

impl Atom {
    /// Create an atom at a position.
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Self {
            element: element.into(),
            position,
        }
    }
}

/// Input description of one molecule in a batch.
///
/// Immutable once loaded; the orchestrator owns it for the duration of
/// a batch run. The basis-set fallback never mutates a spec — it derives
/// a new one via [`MoleculeSpec::with_basis`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeSpec {
    /// Identifier, typically the input file stem.
    pub id: String,
    /// Atomic geometry.
    pub geometry: Vec<Atom>,
    /// Basis-set name (e.g. "sto-3g", "6-31g", "cc-pvdz").
    pub basis: String,
    /// Total charge.
    pub charge: i32,
    /// Spin (2S).
    pub spin: i32,
    /// Whether to exploit molecular symmetry.
    pub symmetry: bool,
    /// Number of frozen orbitals, if restricted.
    pub n_frozen: Option<u32>,
}

impl MoleculeSpec {
    /// Create a spec with default basis and neutral charge.
    pub fn new(id: impl Into<String>, geometry: Vec<Atom>) -> Self {
        Self {
            id: id.into(),
            geometry,
            basis: "sto-3g".to_string(),
            charge: 0,
            spin: 0,
            symmetry: false,
            n_frozen: None,
        }
    }

    /// Set the basis-set name.
    pub fn with_basis_name(mut self, basis: impl Into<String>) -> Self {
        self.basis = basis.into();
        self
    }

    /// Set the charge.
    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = charge;
        self
    }

    /// Set the spin.
    pub fn with_spin(mut self, spin: i32) -> Self {
        self.spin = spin;
        self
    }

    /// Number of atoms in the geometry.
    pub fn num_atoms(&self) -> usize {
        self.geometry.len()
    }

    /// Derive the same molecule under a different basis set.
    ///
    /// Used by the basis fallback: same geometry, charge, spin, and
    /// symmetry; frozen-orbital restriction is dropped because it was
    /// calibrated against the original basis.
    pub fn with_basis(&self, basis: &str) -> MoleculeSpec {
        MoleculeSpec {
            id: self.id.clone(),
            geometry: self.geometry.clone(),
            basis: basis.to_string(),
            charge: self.charge,
            spin: self.spin,
            symmetry: self.symmetry,
            n_frozen: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h2() -> MoleculeSpec {
        MoleculeSpec::new(
            "h2",
            vec![
                Atom::new("H", [0.0, 0.0, 0.0]),
                Atom::new("H", [0.0, 0.0, 0.74]),
            ],
        )
        .with_basis_name("cc-pvdz")
    }

    #[test]
    fn test_with_basis_keeps_geometry() {
        let spec = h2();
        let fallback = spec.with_basis("sto-3g");

        assert_eq!(fallback.id, "h2");
        assert_eq!(fallback.basis, "sto-3g");
        assert_eq!(fallback.geometry, spec.geometry);
        assert_eq!(fallback.n_frozen, None);
    }

    #[test]
    fn test_num_atoms() {
        assert_eq!(h2().num_atoms(), 2);
    }
}
