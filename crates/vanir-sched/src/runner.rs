//! Phase-2 SQD refinement loop.
//!
//! Drives the sample-based diagonalization kernel one iteration at a
//! time, persisting solver state after every iteration so an aborted
//! run resumes mid-loop instead of restarting. Checkpoint keys fold in
//! the molecule, the basis, and a digest of the solver knobs — a rerun
//! with different settings never reads a stale checkpoint as its own.
//!
//! A kernel failure in the basis-mismatch class restarts the molecule
//! once on the fallback basis, with fresh preparation and a fresh
//! checkpoint key. A second mismatch is terminal. Any other kernel
//! error propagates with the checkpoint left in place for resume.

use std::sync::Arc;

use tracing::{info, warn};
use vanir_chem::{SolverState, SqdKernel};
use vanir_policy::{CheckpointState, Checkpointer};

use crate::config::BatchConfig;
use crate::error::{SchedError, SchedResult};
use crate::orchestrator::{PreparedCompound, Preparer};

/// Final state of one molecule's SQD refinement.
#[derive(Debug, Clone)]
pub struct SqdOutcome {
    /// Molecule identifier.
    pub molecule: String,
    /// Basis set the reported energy was computed under.
    pub basis: String,
    /// Total energy, nuclear repulsion included.
    pub energy: f64,
    /// Iterations completed.
    pub iterations: u32,
    /// Whether the energy converged within tolerance. A `false` here is
    /// a reportable outcome, not an error.
    pub converged: bool,
    /// Whether the basis-set fallback was taken.
    pub used_fallback_basis: bool,
    /// The prepared compound the outcome was computed from. After a
    /// basis fallback this is the re-prepared one.
    pub compound: PreparedCompound,
}

/// Runs the checkpointed SQD loop for prepared compounds.
pub struct SqdRunner {
    kernel: Arc<dyn SqdKernel>,
    checkpoints: Checkpointer,
    config: BatchConfig,
}

impl SqdRunner {
    /// Create a runner; opens the checkpoint store under
    /// `config.checkpoint_dir`.
    pub fn new(kernel: Arc<dyn SqdKernel>, config: &BatchConfig) -> SchedResult<Self> {
        Ok(Self {
            kernel,
            checkpoints: Checkpointer::new(&config.checkpoint_dir)?,
            config: config.clone(),
        })
    }

    fn checkpoint_key(&self, molecule: &str, basis: &str) -> String {
        format!("{molecule}_{basis}_{}", self.config.run_digest())
    }

    /// Iterate the kernel until convergence or the iteration cap,
    /// persisting state after every iteration.
    async fn refine(&self, compound: &PreparedCompound) -> SchedResult<(SolverState, bool)> {
        let key = self.checkpoint_key(&compound.molecule.id, &compound.structure.basis);

        let mut prior: Option<SolverState> = self
            .checkpoints
            .load::<SolverState>(&key)
            .await?
            .map(|envelope| {
                info!(
                    molecule = %compound.molecule.id,
                    iteration = envelope.iteration,
                    "Resuming refinement from checkpoint"
                );
                envelope.state
            });

        loop {
            if let Some(state) = &prior {
                if state.iteration >= self.config.max_iterations {
                    return Ok((state.clone(), false));
                }
            }

            let (state, converged) = self
                .kernel
                .iterate(
                    &compound.structure,
                    prior.as_ref(),
                    &compound.execution.samples,
                    self.config.energy_tol,
                )
                .await?;

            self.checkpoints
                .store(
                    &key,
                    &CheckpointState::new(&compound.molecule.id, state.iteration, state.clone()),
                )
                .await?;
            info!(
                molecule = %compound.molecule.id,
                iteration = state.iteration,
                energy = state.energy,
                converged,
                "SQD iteration complete"
            );

            if converged {
                return Ok((state, true));
            }
            prior = Some(state);
        }
    }

    fn outcome(
        compound: PreparedCompound,
        state: SolverState,
        converged: bool,
        used_fallback_basis: bool,
    ) -> SqdOutcome {
        SqdOutcome {
            molecule: compound.molecule.id.clone(),
            basis: compound.structure.basis.clone(),
            energy: state.energy + compound.structure.nuclear_repulsion_energy,
            iterations: state.iteration,
            converged,
            used_fallback_basis,
            compound,
        }
    }

    /// Run the refinement loop for one prepared compound, applying the
    /// basis-set fallback on a basis-mismatch failure.
    ///
    /// The checkpoint is discarded on every terminal outcome so the
    /// next batch starts the molecule cleanly.
    pub async fn run(
        &self,
        preparer: &dyn Preparer,
        compound: PreparedCompound,
    ) -> SchedResult<SqdOutcome> {
        let key = self.checkpoint_key(&compound.molecule.id, &compound.structure.basis);

        match self.refine(&compound).await {
            Ok((state, converged)) => {
                if !converged {
                    warn!(
                        molecule = %compound.molecule.id,
                        iterations = state.iteration,
                        "Refinement hit iteration cap without converging"
                    );
                }
                self.checkpoints.discard(&key).await?;
                Ok(Self::outcome(compound, state, converged, false))
            }
            Err(e) if e.is_basis_mismatch() => {
                self.checkpoints.discard(&key).await?;

                let fallback_basis = self.config.fallback_basis.clone();
                if compound.structure.basis == fallback_basis {
                    return Err(SchedError::BasisFallbackFailed {
                        molecule: compound.molecule.id.clone(),
                        fallback_basis,
                    });
                }
                warn!(
                    molecule = %compound.molecule.id,
                    basis = %compound.structure.basis,
                    fallback = %fallback_basis,
                    error = %e,
                    "Basis mismatch, restarting on fallback basis"
                );

                let fallback_spec = compound.molecule.with_basis(&fallback_basis);
                let refreshed = preparer
                    .prepare(&fallback_spec, &compound.assignment)
                    .await?;
                let fallback_key =
                    self.checkpoint_key(&refreshed.molecule.id, &refreshed.structure.basis);

                match self.refine(&refreshed).await {
                    Ok((state, converged)) => {
                        self.checkpoints.discard(&fallback_key).await?;
                        Ok(Self::outcome(refreshed, state, converged, true))
                    }
                    Err(e2) if e2.is_basis_mismatch() => {
                        self.checkpoints.discard(&fallback_key).await?;
                        Err(SchedError::BasisFallbackFailed {
                            molecule: refreshed.molecule.id.clone(),
                            fallback_basis,
                        })
                    }
                    Err(e2) => Err(e2),
                }
            }
            Err(e) => Err(e),
        }
    }
}
