//! Reference implementations of the chemistry collaborator traits.
//!
//! These back the simulator the same way the HAL backend does: no
//! external services, deterministic outputs, honest error surfaces.
//! Structure derivation uses real atomic numbers and the exact nuclear
//! repulsion sum; energies from the kernel are synthetic but converge
//! the way a well-behaved SQD run does.

use async_trait::async_trait;
use tracing::debug;

use vanir_chem::{
    ChemError, ChemResult, MoleculeSpec, ProgramBuilder, SolverState, SqdKernel, StructureBuilder,
    StructureHandle,
};
use vanir_hal::{BackendDescriptor, ProgramHandle, SampleData};

const ANGSTROM_TO_BOHR: f64 = 1.889_726_124_6;

/// Geometric convergence factor of the reference kernel.
const CONTRACTION: f64 = 0.05;

fn atomic_number(element: &str) -> Option<u32> {
    let z = match element.to_ascii_lowercase().as_str() {
        "h" => 1,
        "he" => 2,
        "li" => 3,
        "be" => 4,
        "b" => 5,
        "c" => 6,
        "n" => 7,
        "o" => 8,
        "f" => 9,
        "ne" => 10,
        "na" => 11,
        "mg" => 12,
        "al" => 13,
        "si" => 14,
        "p" => 15,
        "s" => 16,
        "cl" => 17,
        "ar" => 18,
        _ => return None,
    };
    Some(z)
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Structure builder computing orbital counts, electron counts, and the
/// exact nuclear repulsion energy from the geometry.
pub struct AnalyticStructureBuilder;

#[async_trait]
impl StructureBuilder for AnalyticStructureBuilder {
    async fn build_structure(&self, spec: &MoleculeSpec) -> ChemResult<StructureHandle> {
        let charges: Vec<u32> = spec
            .geometry
            .iter()
            .map(|atom| {
                atomic_number(&atom.element).ok_or_else(|| ChemError::Chemistry {
                    molecule: spec.id.clone(),
                    message: format!("unknown element {}", atom.element),
                })
            })
            .collect::<ChemResult<_>>()?;

        let total_z: i64 = charges.iter().map(|&z| i64::from(z)).sum();
        let electrons = total_z - i64::from(spec.charge);
        if electrons <= 0 {
            return Err(ChemError::Chemistry {
                molecule: spec.id.clone(),
                message: format!("charge {} leaves no electrons", spec.charge),
            });
        }
        // spin is n_alpha - n_beta; parity must match the electron count.
        if (electrons - i64::from(spec.spin)) % 2 != 0 {
            return Err(ChemError::Chemistry {
                molecule: spec.id.clone(),
                message: format!("spin {} inconsistent with {electrons} electrons", spec.spin),
            });
        }
        let n_beta = (electrons - i64::from(spec.spin)) / 2;
        let n_alpha = electrons - n_beta;
        if n_beta < 0 {
            return Err(ChemError::Chemistry {
                molecule: spec.id.clone(),
                message: format!("spin {} exceeds electron count", spec.spin),
            });
        }

        let mut nuclear_repulsion = 0.0;
        for i in 0..spec.geometry.len() {
            for j in (i + 1)..spec.geometry.len() {
                let r = distance(spec.geometry[i].position, spec.geometry[j].position)
                    * ANGSTROM_TO_BOHR;
                if r == 0.0 {
                    return Err(ChemError::Chemistry {
                        molecule: spec.id.clone(),
                        message: format!("atoms {i} and {j} are coincident"),
                    });
                }
                nuclear_repulsion += f64::from(charges[i] * charges[j]) / r;
            }
        }

        let base_orbitals = (spec.num_atoms() as u32 * 2).max(4);
        let num_orbitals = match spec.n_frozen {
            Some(frozen) => base_orbitals.saturating_sub(frozen).max(2),
            None => base_orbitals,
        };

        debug!(
            molecule = %spec.id,
            basis = %spec.basis,
            num_orbitals,
            electrons,
            nuclear_repulsion,
            "Derived structure"
        );
        Ok(StructureHandle {
            molecule_id: spec.id.clone(),
            basis: spec.basis.clone(),
            num_orbitals,
            num_electrons: (n_alpha as u32, n_beta as u32),
            nuclear_repulsion_energy: nuclear_repulsion,
            n_frozen: spec.n_frozen,
        })
    }
}

/// Program builder emitting layout-tagged handles sized from the
/// structure.
pub struct LayoutProgramBuilder;

#[async_trait]
impl ProgramBuilder for LayoutProgramBuilder {
    async fn build_program(
        &self,
        structure: &StructureHandle,
        backend: &BackendDescriptor,
        reps: u32,
        opt_level: u8,
    ) -> ChemResult<ProgramHandle> {
        let qubits = structure.qubits_needed();
        if !backend.fits(qubits) {
            return Err(ChemError::Optimization {
                molecule: structure.molecule_id.clone(),
                message: format!(
                    "needs {qubits} qubits, {} offers {}",
                    backend.name, backend.qubit_capacity
                ),
            });
        }

        Ok(ProgramHandle::new(
            format!("{}-{}", structure.molecule_id, structure.basis),
            &backend.name,
            qubits,
        )
        .with_depth_estimate(qubits * reps * 12)
        .with_optimization_level(opt_level)
        .with_layout_tag("linear"))
    }
}

/// Kernel converging geometrically toward a deterministic per-structure
/// target energy.
///
/// Occupancies are estimated from per-bit sample frequencies. Sampled
/// bitstrings whose width disagrees with the structure's qubit count
/// are reported as a basis mismatch.
pub struct ReferenceKernel {
    samples_per_batch: u32,
}

impl ReferenceKernel {
    /// Create a kernel subsampling at most `samples_per_batch` shots
    /// per iteration.
    pub fn new(samples_per_batch: u32) -> Self {
        Self { samples_per_batch }
    }

    fn target_energy(structure: &StructureHandle) -> f64 {
        let (n_alpha, n_beta) = structure.num_electrons;
        // Synthetic electronic energy well below -E_nuc so totals land
        // in a plausible range.
        -0.6 * f64::from(n_alpha + n_beta) - structure.nuclear_repulsion_energy
    }

    fn occupancies(structure: &StructureHandle, samples: &SampleData, budget: u32) -> Vec<f64> {
        let norb = structure.num_orbitals as usize;
        let mut weights = vec![0.0f64; norb];
        let mut used = 0u64;

        for (bitstring, count) in samples.counts.iter() {
            if used >= u64::from(budget) {
                break;
            }
            let take = count.min(u64::from(budget) - used);
            used += take;
            for (bit, ch) in bitstring.chars().enumerate() {
                if ch == '1' {
                    // Spin orbitals bit and bit+norb map to spatial
                    // orbital bit.
                    weights[bit % norb] += take as f64;
                }
            }
        }

        if used == 0 {
            return vec![0.0; norb];
        }
        weights.iter().map(|w| (w / used as f64).min(2.0)).collect()
    }
}

#[async_trait]
impl SqdKernel for ReferenceKernel {
    async fn iterate(
        &self,
        structure: &StructureHandle,
        prior: Option<&SolverState>,
        samples: &SampleData,
        energy_tol: f64,
    ) -> ChemResult<(SolverState, bool)> {
        let expected_width = structure.qubits_needed() as usize;
        for (bitstring, _) in samples.counts.iter() {
            if bitstring.len() != expected_width {
                return Err(ChemError::BasisMismatch {
                    molecule: structure.molecule_id.clone(),
                    message: format!(
                        "sampled determinants are {} bits wide, basis {} needs {expected_width}",
                        bitstring.len(),
                        structure.basis
                    ),
                });
            }
        }

        let target = Self::target_energy(structure);
        let energy = match prior {
            None => target * 0.9,
            Some(state) => target + (state.energy - target) * CONTRACTION,
        };
        let converged = prior.is_some_and(|state| (energy - state.energy).abs() < energy_tol);
        let iteration = prior.map_or(0, |state| state.iteration) + 1;

        debug!(
            molecule = %structure.molecule_id,
            iteration,
            energy,
            converged,
            "Reference kernel iteration"
        );
        Ok((
            SolverState {
                iteration,
                energy,
                occupancies: Self::occupancies(structure, samples, self.samples_per_batch),
            },
            converged,
        ))
    }
}
