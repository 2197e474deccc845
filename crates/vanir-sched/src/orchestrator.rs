//! Two-phase batch orchestrator.
//!
//! Phase 1 prepares every assigned molecule concurrently under a
//! semaphore bound and the host-capacity gate: memoized structure
//! build, interactive-retried program build, engine submission with
//! backend fallback. Phase 2 starts only after the Phase-1 join
//! barrier and runs the checkpointed SQD loop strictly sequentially,
//! in input order, writing one result file per successful molecule.
//!
//! Failures are isolated per molecule: a terminal failure produces a
//! `Failed` outcome for that molecule and the batch continues. The
//! orchestrator itself only errors on infrastructure faults (store
//! directories unusable, a preparation worker panicking).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use vanir_chem::{
    CompoundLoad, MoleculeSpec, ProgramBuilder, SqdKernel, StructureBuilder, StructureHandle,
};
use vanir_hal::{BackendDescriptor, BackendRegistry, ExecutionRecord, ProgramHandle};
use vanir_policy::{
    retry_with_signal, CapacityMonitor, LoadSource, MemoCache, ProcLoadSource, RetrySignal,
};

use crate::config::BatchConfig;
use crate::engine::ExecutionEngine;
use crate::error::{SchedError, SchedResult};
use crate::report::{ResultRecord, ResultWriter};
use crate::runner::SqdRunner;
use crate::selector::{self, BackendAssignment};

/// Everything Phase 1 produces for one molecule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedCompound {
    /// The input molecule.
    pub molecule: MoleculeSpec,
    /// Backend assignment the preparation targeted.
    pub assignment: BackendAssignment,
    /// Derived computational structure.
    pub structure: StructureHandle,
    /// Program built and optimized for the assigned backend.
    pub program: ProgramHandle,
    /// Record of the sampling execution, fallback included.
    pub execution: ExecutionRecord,
}

/// Prepares one molecule end to end. The runner re-invokes this for
/// the basis-set fallback, so it must be safe to call for the same
/// molecule under a different basis.
#[async_trait]
pub trait Preparer: Send + Sync {
    /// Run the full preparation chain for a molecule on its assigned
    /// backend.
    async fn prepare(
        &self,
        spec: &MoleculeSpec,
        assignment: &BackendAssignment,
    ) -> SchedResult<PreparedCompound>;
}

/// Production [`Preparer`]: capacity gate, memoized structure build,
/// interactive-retried program build, engine submission.
pub struct PreparationPipeline {
    structures: Arc<dyn StructureBuilder>,
    programs: Arc<dyn ProgramBuilder>,
    engine: ExecutionEngine,
    capacity: CapacityMonitor,
    memo: Arc<MemoCache>,
    signal: RetrySignal,
    snapshot: Vec<BackendDescriptor>,
    config: BatchConfig,
}

impl PreparationPipeline {
    /// Assemble a pipeline over a backend snapshot taken at batch
    /// start.
    pub fn new(
        registry: Arc<BackendRegistry>,
        structures: Arc<dyn StructureBuilder>,
        programs: Arc<dyn ProgramBuilder>,
        load_source: Arc<dyn LoadSource>,
        memo: Arc<MemoCache>,
        signal: RetrySignal,
        snapshot: Vec<BackendDescriptor>,
        config: &BatchConfig,
    ) -> Self {
        Self {
            structures,
            programs,
            engine: ExecutionEngine::new(registry, config),
            capacity: CapacityMonitor::new(
                load_source,
                config.load_threshold,
                config.capacity_poll_interval,
            ),
            memo,
            signal,
            snapshot,
            config: config.clone(),
        }
    }

    /// Handle an operator can fire to cut short the current retry wait.
    pub fn retry_signal(&self) -> RetrySignal {
        self.signal.clone()
    }

    fn descriptor(&self, name: &str) -> SchedResult<&BackendDescriptor> {
        self.snapshot
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| SchedError::NoCandidateBackend {
                molecule: String::new(),
                reason: format!("backend {name} missing from snapshot"),
            })
    }
}

#[async_trait]
impl Preparer for PreparationPipeline {
    async fn prepare(
        &self,
        spec: &MoleculeSpec,
        assignment: &BackendAssignment,
    ) -> SchedResult<PreparedCompound> {
        self.capacity.await_capacity().await;

        // Structure derivation is the expensive deterministic step:
        // memoized across runs, interactively retried within one.
        let structure: StructureHandle = self
            .memo
            .get_or_compute("build_structure", spec, || async {
                retry_with_signal(self.config.interactive_retry, &self.signal, || {
                    self.structures.build_structure(spec)
                })
                .await
                .map_err(SchedError::from)
            })
            .await?;

        let descriptor = self.descriptor(&assignment.backend)?.clone();
        let program = retry_with_signal(self.config.interactive_retry, &self.signal, || {
            self.programs.build_program(
                &structure,
                &descriptor,
                self.config.reps,
                self.config.opt_level,
            )
        })
        .await?;

        let execution = self
            .engine
            .execute(spec, assignment, &program, &self.snapshot, self.config.shots)
            .await?;

        info!(
            molecule = %spec.id,
            basis = %structure.basis,
            backend = %execution.backend,
            "Preparation complete"
        );
        Ok(PreparedCompound {
            molecule: spec.clone(),
            assignment: assignment.clone(),
            structure,
            program,
            execution,
        })
    }
}

/// Stage at which a molecule's batch processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStage {
    /// Molecule input file could not be parsed.
    Loading,
    /// No feasible backend for the molecule.
    Assignment,
    /// Phase-1 preparation (structure, program, or execution).
    Preparation,
    /// Phase-2 SQD refinement.
    Refinement,
    /// Result-file write.
    Reporting,
}

impl std::fmt::Display for BatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BatchStage::Loading => "loading",
            BatchStage::Assignment => "assignment",
            BatchStage::Preparation => "preparation",
            BatchStage::Refinement => "refinement",
            BatchStage::Reporting => "reporting",
        };
        write!(f, "{name}")
    }
}

/// Terminal outcome for one molecule in a batch. Every input molecule
/// gets exactly one, in input order.
#[derive(Debug)]
pub enum MoleculeOutcome {
    /// The molecule completed with a persisted result file.
    Completed {
        molecule: String,
        record: ResultRecord,
        path: PathBuf,
    },
    /// The molecule failed terminally at the named stage.
    Failed {
        molecule: String,
        stage: BatchStage,
        error: String,
    },
}

impl MoleculeOutcome {
    /// Molecule the outcome belongs to.
    pub fn molecule(&self) -> &str {
        match self {
            MoleculeOutcome::Completed { molecule, .. }
            | MoleculeOutcome::Failed { molecule, .. } => molecule,
        }
    }

    /// Whether the molecule produced a result file.
    pub fn is_completed(&self) -> bool {
        matches!(self, MoleculeOutcome::Completed { .. })
    }
}

/// Drives a whole batch: assignment, Phase 1, join barrier, Phase 2,
/// reporting.
pub struct BatchOrchestrator {
    registry: Arc<BackendRegistry>,
    structures: Arc<dyn StructureBuilder>,
    programs: Arc<dyn ProgramBuilder>,
    kernel: Arc<dyn SqdKernel>,
    load_source: Arc<dyn LoadSource>,
    signal: RetrySignal,
    config: BatchConfig,
}

impl BatchOrchestrator {
    /// Create an orchestrator sampling host load from `/proc`.
    pub fn new(
        registry: Arc<BackendRegistry>,
        structures: Arc<dyn StructureBuilder>,
        programs: Arc<dyn ProgramBuilder>,
        kernel: Arc<dyn SqdKernel>,
        config: BatchConfig,
    ) -> Self {
        Self {
            registry,
            structures,
            programs,
            kernel,
            load_source: Arc::new(ProcLoadSource::new()),
            signal: RetrySignal::new(),
            config,
        }
    }

    /// Replace the host-load source (tests, containerized hosts).
    pub fn with_load_source(mut self, source: Arc<dyn LoadSource>) -> Self {
        self.load_source = source;
        self
    }

    /// Handle an operator can fire to cut short the current interactive
    /// retry wait in Phase 1.
    pub fn retry_signal(&self) -> RetrySignal {
        self.signal.clone()
    }

    /// Run one batch over per-file load results.
    ///
    /// Rejected files fail alone: each becomes a `Loading`-stage
    /// `Failed` outcome while every file that parsed still runs.
    /// Outcomes come back one per load, in load order.
    pub async fn run_loads(&self, loads: &[CompoundLoad]) -> SchedResult<Vec<MoleculeOutcome>> {
        let mut slots: Vec<Option<MoleculeOutcome>> = loads
            .iter()
            .map(|load| match load {
                CompoundLoad::Loaded(_) => None,
                CompoundLoad::Rejected { molecule, error } => Some(MoleculeOutcome::Failed {
                    molecule: molecule.clone(),
                    stage: BatchStage::Loading,
                    error: error.to_string(),
                }),
            })
            .collect();

        let molecules: Vec<MoleculeSpec> =
            loads.iter().filter_map(|l| l.spec().cloned()).collect();
        let mut ran = self.run(&molecules).await?.into_iter();
        for slot in &mut slots {
            if slot.is_none() {
                *slot = ran.next();
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }

    /// Run one batch. Returns one outcome per input molecule, in input
    /// order.
    pub async fn run(&self, molecules: &[MoleculeSpec]) -> SchedResult<Vec<MoleculeOutcome>> {
        let memo = Arc::new(MemoCache::new(&self.config.cache_dir, self.config.memo_ttl)?);
        if self.config.clear_cache_on_start {
            let removed = memo.clear().await?;
            info!(removed, "Cleared memoization store before run");
        }

        let snapshot = self.registry.snapshot().await;
        info!(
            molecules = molecules.len(),
            backends = snapshot.len(),
            "Starting batch"
        );

        let assignments =
            selector::analyze_and_assign(molecules, &snapshot, self.config.load_factor);

        let pipeline = Arc::new(PreparationPipeline::new(
            self.registry.clone(),
            self.structures.clone(),
            self.programs.clone(),
            self.load_source.clone(),
            memo,
            self.signal.clone(),
            snapshot,
            &self.config,
        ));

        // Phase 1: bounded-concurrency preparation. Input order is
        // preserved through the slot index, not completion order.
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_preparations));
        let mut workers = JoinSet::new();
        let mut prepared: Vec<Option<SchedResult<PreparedCompound>>> =
            molecules.iter().map(|_| None).collect();

        for (idx, spec) in molecules.iter().enumerate() {
            let Some(assignment) = assignments.get(&spec.id) else {
                prepared[idx] = Some(Err(SchedError::NoCandidateBackend {
                    molecule: spec.id.clone(),
                    reason: "no registered backend fits".to_string(),
                }));
                continue;
            };

            let pipeline = pipeline.clone();
            let semaphore = semaphore.clone();
            let spec = spec.clone();
            let assignment = assignment.clone();
            workers.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                (idx, pipeline.prepare(&spec, &assignment).await)
            });
        }

        while let Some(joined) = workers.join_next().await {
            let (idx, result) = joined.map_err(std::io::Error::other)?;
            prepared[idx] = Some(result);
        }

        // Phase 2: strictly sequential refinement in input order.
        let runner = SqdRunner::new(self.kernel.clone(), &self.config)?;
        let writer = ResultWriter::new(&self.config.result_dir)?;
        let mut outcomes = Vec::with_capacity(molecules.len());

        for (idx, spec) in molecules.iter().enumerate() {
            let outcome = match prepared[idx].take() {
                Some(Ok(compound)) => match runner.run(pipeline.as_ref(), compound).await {
                    Ok(sqd) => {
                        let record = ResultRecord::from_outcome(&sqd);
                        match writer.write(&record).await {
                            Ok(path) => MoleculeOutcome::Completed {
                                molecule: spec.id.clone(),
                                record,
                                path,
                            },
                            Err(e) => MoleculeOutcome::Failed {
                                molecule: spec.id.clone(),
                                stage: BatchStage::Reporting,
                                error: e.to_string(),
                            },
                        }
                    }
                    Err(e) => MoleculeOutcome::Failed {
                        molecule: spec.id.clone(),
                        stage: BatchStage::Refinement,
                        error: e.to_string(),
                    },
                },
                Some(Err(e)) => {
                    let stage = match &e {
                        SchedError::NoCandidateBackend { .. } => BatchStage::Assignment,
                        _ => BatchStage::Preparation,
                    };
                    MoleculeOutcome::Failed {
                        molecule: spec.id.clone(),
                        stage,
                        error: e.to_string(),
                    }
                }
                None => MoleculeOutcome::Failed {
                    molecule: spec.id.clone(),
                    stage: BatchStage::Preparation,
                    error: "preparation worker produced no result".to_string(),
                },
            };

            if let MoleculeOutcome::Failed {
                molecule,
                stage,
                error,
            } = &outcome
            {
                warn!(molecule = %molecule, stage = %stage, error = %error, "Molecule failed");
            }
            outcomes.push(outcome);
        }

        let completed = outcomes.iter().filter(|o| o.is_completed()).count();
        info!(
            completed,
            failed = outcomes.len() - completed,
            "Batch finished"
        );
        Ok(outcomes)
    }
}
