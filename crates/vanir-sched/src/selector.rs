//! Backend selection and load balancing.
//!
//! Greedy per-molecule assignment: each molecule independently gets the
//! backend with the lowest score, where
//!
//! ```text
//!   score = runtime_cost(complexity, backend) + load_factor * queue_depth
//! ```
//!
//! No global optimum is attempted — queue depths are refreshed between
//! batches, not within one assignment pass, so a cleverer schedule
//! would be built on stale data anyway. The whole pass is a pure
//! function of (complexity estimates, backend snapshot, load factor):
//! identical inputs produce the identical assignment map, ties broken
//! by lexical backend name.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vanir_chem::{ComplexityEstimate, MoleculeSpec};
use vanir_hal::BackendDescriptor;

use crate::error::{SchedError, SchedResult};

/// Depth above which a flat penalty applies — deep circuits degrade on
/// every backend, so steer them toward roomier ones.
const DEPTH_PENALTY_THRESHOLD: u32 = 400;
const DEPTH_PENALTY: f64 = 100.0;

/// One molecule-to-backend assignment, with the score that produced it.
///
/// Computed once per batch at the start of Phase 1; never mutated.
/// Fallback re-selection produces a new record instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendAssignment {
    /// Molecule identifier.
    pub molecule: String,
    /// Assigned backend name.
    pub backend: String,
    /// Score the assignment won with (lower is better).
    pub score: f64,
}

/// Raw runtime cost of a molecule on a backend, ignoring load.
///
/// `None` when the backend cannot hold the program at all.
fn runtime_cost(estimate: &ComplexityEstimate, backend: &BackendDescriptor) -> Option<f64> {
    if !backend.fits(estimate.qubits_needed) {
        return None;
    }
    let depth_penalty = if estimate.depth_estimate > DEPTH_PENALTY_THRESHOLD {
        DEPTH_PENALTY
    } else {
        0.0
    };
    Some(f64::from(estimate.total) * 100.0 * backend.cost_weight + depth_penalty)
}

/// Score one backend for one molecule. `None` for infeasible backends.
fn score(
    estimate: &ComplexityEstimate,
    backend: &BackendDescriptor,
    load_factor: f64,
) -> Option<f64> {
    runtime_cost(estimate, backend).map(|cost| cost + load_factor * f64::from(backend.queue_depth))
}

/// Pick the minimum-score candidate, ties broken by lexical name order.
fn best_candidate<'a>(
    estimate: &ComplexityEstimate,
    candidates: impl Iterator<Item = &'a BackendDescriptor>,
    load_factor: f64,
) -> Option<(&'a BackendDescriptor, f64)> {
    candidates
        .filter_map(|backend| score(estimate, backend, load_factor).map(|s| (backend, s)))
        .min_by(|(a, sa), (b, sb)| {
            sa.partial_cmp(sb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        })
}

/// Assign one molecule to its best backend.
pub fn assign_one(
    spec: &MoleculeSpec,
    backends: &[BackendDescriptor],
    load_factor: f64,
) -> SchedResult<BackendAssignment> {
    let estimate = ComplexityEstimate::for_molecule(spec);

    let (backend, score) = best_candidate(&estimate, backends.iter(), load_factor).ok_or_else(
        || SchedError::NoCandidateBackend {
            molecule: spec.id.clone(),
            reason: format!("needs {} qubits", estimate.qubits_needed),
        },
    )?;

    info!(
        molecule = %spec.id,
        backend = %backend.name,
        score,
        complexity = estimate.total,
        qubits_needed = estimate.qubits_needed,
        "Assigned backend"
    );

    Ok(BackendAssignment {
        molecule: spec.id.clone(),
        backend: backend.name.clone(),
        score,
    })
}

/// Analyze all molecules and assign each its best backend.
///
/// Molecules with no feasible backend are logged and omitted from the
/// map — the orchestrator records them as terminal failures without
/// aborting the batch.
pub fn analyze_and_assign(
    molecules: &[MoleculeSpec],
    backends: &[BackendDescriptor],
    load_factor: f64,
) -> FxHashMap<String, BackendAssignment> {
    let mut assignments = FxHashMap::default();

    for spec in molecules {
        match assign_one(spec, backends, load_factor) {
            Ok(assignment) => {
                assignments.insert(spec.id.clone(), assignment);
            }
            Err(e) => warn!(molecule = %spec.id, error = %e, "No backend assignable"),
        }
    }

    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for assignment in assignments.values() {
        *counts.entry(assignment.backend.as_str()).or_insert(0) += 1;
    }
    let mut summary: Vec<_> = counts.into_iter().collect();
    summary.sort();
    for (backend, count) in summary {
        info!(backend, count, "Load balancing summary");
    }

    assignments
}

/// Re-select a simulator-class backend after a hardware attempt is
/// exhausted. The failed backend is excluded from candidates.
pub fn reselect(
    spec: &MoleculeSpec,
    prior: &BackendAssignment,
    backends: &[BackendDescriptor],
    load_factor: f64,
) -> SchedResult<BackendAssignment> {
    let estimate = ComplexityEstimate::for_molecule(spec);

    let candidates = backends
        .iter()
        .filter(|b| b.is_simulator() && b.name != prior.backend);

    let (backend, score) = best_candidate(&estimate, candidates, load_factor).ok_or_else(|| {
        SchedError::NoCandidateBackend {
            molecule: spec.id.clone(),
            reason: format!(
                "no simulator backend (excluding {}) fits {} qubits",
                prior.backend, estimate.qubits_needed
            ),
        }
    })?;

    info!(
        molecule = %spec.id,
        from = %prior.backend,
        to = %backend.name,
        score,
        "Re-selected simulator backend for fallback"
    );

    Ok(BackendAssignment {
        molecule: spec.id.clone(),
        backend: backend.name.clone(),
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanir_chem::Atom;
    use vanir_hal::BackendKind;

    fn molecule(id: &str, n_atoms: usize, basis: &str) -> MoleculeSpec {
        let geometry = (0..n_atoms)
            .map(|i| Atom::new("H", [0.0, 0.0, i as f64]))
            .collect();
        MoleculeSpec::new(id, geometry).with_basis_name(basis)
    }

    fn hw(name: &str, qubits: u32, queue: u32) -> BackendDescriptor {
        BackendDescriptor::new(name, BackendKind::Hardware, qubits).with_queue_depth(queue)
    }

    fn sim(name: &str, qubits: u32) -> BackendDescriptor {
        BackendDescriptor::new(name, BackendKind::Simulator, qubits)
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let molecules = vec![
            molecule("h2", 2, "sto-3g"),
            molecule("h2o", 3, "6-31g"),
            molecule("lih", 2, "cc-pvdz"),
        ];
        let backends = vec![hw("aurora", 127, 3), hw("borealis", 156, 1), sim("aer", 64)];

        let a = analyze_and_assign(&molecules, &backends, 20_000.0);
        let b = analyze_and_assign(&molecules, &backends, 20_000.0);

        assert_eq!(a.len(), 3);
        for (id, assignment) in &a {
            assert_eq!(assignment, &b[id]);
        }
    }

    #[test]
    fn test_tie_broken_by_lexical_name() {
        let spec = molecule("h2", 2, "sto-3g");
        // Identical capacity, queue, and weight — identical scores.
        let backends = vec![hw("zephyr", 64, 0), hw("aurora", 64, 0)];

        let assignment = assign_one(&spec, &backends, 20_000.0).unwrap();
        assert_eq!(assignment.backend, "aurora");
    }

    #[test]
    fn test_queue_depth_penalty_dominates() {
        let spec = molecule("h2", 2, "sto-3g");
        // Busy backend is cheaper per job but carries one queued job.
        let backends = vec![
            hw("busy", 127, 1).with_cost_weight(0.5),
            hw("idle", 64, 0),
        ];

        let assignment = assign_one(&spec, &backends, 20_000.0).unwrap();
        assert_eq!(assignment.backend, "idle");

        // With a negligible load factor the cheaper backend wins again.
        let assignment = assign_one(&spec, &backends, 0.0).unwrap();
        assert_eq!(assignment.backend, "busy");
    }

    #[test]
    fn test_near_capacity_backend_only_wins_when_score_wins() {
        // Three molecules, one near-capacity backend and two idle ones.
        let molecules = vec![
            molecule("tiny", 1, "sto-3g"),   // 8 qubits
            molecule("small", 2, "sto-3g"),  // 8 qubits
            molecule("large", 6, "cc-pvdz"), // 24 qubits
        ];
        let backends = vec![
            hw("crowded", 156, 5).with_cost_weight(0.1),
            hw("idle_a", 16, 0),
            hw("idle_b", 16, 0),
        ];

        let assignments = analyze_and_assign(&molecules, &backends, 20_000.0);
        // The loadFactor penalty (5 * 20000) dwarfs any cost advantage,
        // so the idle backends win everything they can hold.
        assert_eq!(assignments["tiny"].backend, "idle_a");
        assert_eq!(assignments["small"].backend, "idle_a");
        // The large molecule does not fit the idle backends; the
        // crowded one wins by being the only feasible candidate.
        assert_eq!(assignments["large"].backend, "crowded");
    }

    #[test]
    fn test_infeasible_molecule_omitted() {
        let molecules = vec![molecule("huge", 40, "cc-pvtz")]; // 160 qubits
        let backends = vec![hw("aurora", 127, 0)];

        let assignments = analyze_and_assign(&molecules, &backends, 20_000.0);
        assert!(assignments.is_empty());
    }

    #[test]
    fn test_reselect_prefers_simulator_and_excludes_failed() {
        let spec = molecule("h2", 2, "sto-3g");
        let prior = BackendAssignment {
            molecule: "h2".into(),
            backend: "aurora".into(),
            score: 100.0,
        };
        let backends = vec![
            hw("aurora", 127, 0),
            hw("borealis", 156, 0),
            sim("aer_a", 64),
            sim("aer_b", 64),
        ];

        let fallback = reselect(&spec, &prior, &backends, 20_000.0).unwrap();
        assert_eq!(fallback.backend, "aer_a");
    }

    #[test]
    fn test_reselect_excludes_failed_simulator() {
        let spec = molecule("h2", 2, "sto-3g");
        let prior = BackendAssignment {
            molecule: "h2".into(),
            backend: "aer_a".into(),
            score: 100.0,
        };
        let backends = vec![sim("aer_a", 64), sim("aer_b", 64)];

        let fallback = reselect(&spec, &prior, &backends, 20_000.0).unwrap();
        assert_eq!(fallback.backend, "aer_b");
    }

    #[test]
    fn test_reselect_fails_without_simulators() {
        let spec = molecule("h2", 2, "sto-3g");
        let prior = BackendAssignment {
            molecule: "h2".into(),
            backend: "aurora".into(),
            score: 100.0,
        };
        let backends = vec![hw("aurora", 127, 0), hw("borealis", 156, 0)];

        assert!(matches!(
            reselect(&spec, &prior, &backends, 20_000.0),
            Err(SchedError::NoCandidateBackend { .. })
        ));
    }
}
