//! End-to-end batch runs over mock backends and collaborators.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vanir_chem::{
    Atom, ChemError, ChemResult, MoleculeSpec, ProgramBuilder, SolverState, SqdKernel,
    StructureBuilder, StructureHandle,
};
use vanir_hal::{
    Backend, BackendAvailability, BackendDescriptor, BackendKind, BackendRegistry, HalError,
    HalResult, JobId, JobStatus, ProgramHandle, SampleCounts, SampleData,
};
use vanir_policy::{LoadSample, LoadSource};
use vanir_sched::{BatchConfig, BatchOrchestrator, MoleculeOutcome};

struct IdleHost;

#[async_trait]
impl LoadSource for IdleHost {
    async fn sample(&self) -> LoadSample {
        LoadSample {
            cpu_percent: 10.0,
            memory_percent: 20.0,
        }
    }
}

/// Simulator that always succeeds.
struct Simulator {
    descriptor: BackendDescriptor,
}

impl Simulator {
    fn new(name: &str, qubits: u32) -> Arc<Self> {
        Arc::new(Self {
            descriptor: BackendDescriptor::new(name, BackendKind::Simulator, qubits),
        })
    }
}

#[async_trait]
impl Backend for Simulator {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn availability(&self) -> HalResult<BackendAvailability> {
        Ok(BackendAvailability::always_available())
    }

    async fn submit(&self, program: &ProgramHandle, _shots: u32) -> HalResult<JobId> {
        Ok(JobId::new(format!("{}-{}", self.name(), program.program_id)))
    }

    async fn status(&self, _job_id: &JobId) -> HalResult<JobStatus> {
        Ok(JobStatus::Completed)
    }

    async fn result(&self, job_id: &JobId) -> HalResult<SampleData> {
        let mut counts = SampleCounts::new();
        counts.add("00110011", 768);
        counts.add("11001100", 256);
        Ok(SampleData::new(job_id.clone(), self.name(), counts))
    }

    async fn cancel(&self, _job_id: &JobId) -> HalResult<()> {
        Ok(())
    }
}

/// Hardware backend whose every submission fails.
struct BrokenHardware {
    descriptor: BackendDescriptor,
    submissions: AtomicU32,
}

impl BrokenHardware {
    fn new(name: &str, qubits: u32) -> Arc<Self> {
        Arc::new(Self {
            // Low cost weight so selection prefers it over simulators.
            descriptor: BackendDescriptor::new(name, BackendKind::Hardware, qubits)
                .with_cost_weight(0.1),
            submissions: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Backend for BrokenHardware {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn availability(&self) -> HalResult<BackendAvailability> {
        Ok(BackendAvailability::with_queue_depth(0))
    }

    async fn submit(&self, _program: &ProgramHandle, _shots: u32) -> HalResult<JobId> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Err(HalError::SubmissionFailed("control stack offline".into()))
    }

    async fn status(&self, _job_id: &JobId) -> HalResult<JobStatus> {
        Err(HalError::JobNotFound("never accepted".into()))
    }

    async fn result(&self, job_id: &JobId) -> HalResult<SampleData> {
        Err(HalError::JobNotFound(job_id.to_string()))
    }

    async fn cancel(&self, _job_id: &JobId) -> HalResult<()> {
        Ok(())
    }
}

/// Structure builder that records peak concurrency.
struct GaugedStructures {
    active: AtomicU32,
    peak: AtomicU32,
}

impl GaugedStructures {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            active: AtomicU32::new(0),
            peak: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl StructureBuilder for GaugedStructures {
    async fn build_structure(&self, spec: &MoleculeSpec) -> ChemResult<StructureHandle> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        Ok(StructureHandle {
            molecule_id: spec.id.clone(),
            basis: spec.basis.clone(),
            num_orbitals: 4,
            num_electrons: (1, 1),
            nuclear_repulsion_energy: 0.715,
            n_frozen: spec.n_frozen,
        })
    }
}

struct Programs;

#[async_trait]
impl ProgramBuilder for Programs {
    async fn build_program(
        &self,
        structure: &StructureHandle,
        backend: &BackendDescriptor,
        _reps: u32,
        opt_level: u8,
    ) -> ChemResult<ProgramHandle> {
        Ok(ProgramHandle::new(
            format!("{}-{}-prog", structure.molecule_id, structure.basis),
            &backend.name,
            structure.qubits_needed(),
        )
        .with_optimization_level(opt_level))
    }
}

/// Kernel converging on the second iteration; optionally reports a
/// basis mismatch whenever the structure is not on sto-3g.
struct Kernel {
    mismatch_above_minimal_basis: bool,
    iterations: AtomicU32,
}

impl Kernel {
    fn converging() -> Arc<Self> {
        Arc::new(Self {
            mismatch_above_minimal_basis: false,
            iterations: AtomicU32::new(0),
        })
    }

    fn mismatching() -> Arc<Self> {
        Arc::new(Self {
            mismatch_above_minimal_basis: true,
            iterations: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl SqdKernel for Kernel {
    async fn iterate(
        &self,
        structure: &StructureHandle,
        prior: Option<&SolverState>,
        _samples: &SampleData,
        _energy_tol: f64,
    ) -> ChemResult<(SolverState, bool)> {
        self.iterations.fetch_add(1, Ordering::SeqCst);
        if self.mismatch_above_minimal_basis && structure.basis != "sto-3g" {
            return Err(ChemError::BasisMismatch {
                molecule: structure.molecule_id.clone(),
                message: format!("sampled determinant outside {} space", structure.basis),
            });
        }
        let iteration = prior.map_or(0, |s| s.iteration) + 1;
        Ok((
            SolverState {
                iteration,
                energy: -1.85,
                occupancies: vec![1.0, 1.0, 0.0, 0.0],
            },
            iteration >= 2,
        ))
    }
}

fn molecule(id: &str) -> MoleculeSpec {
    MoleculeSpec::new(
        id,
        vec![
            Atom::new("H", [0.0, 0.0, 0.0]),
            Atom::new("H", [0.0, 0.0, 0.74]),
        ],
    )
}

fn config(root: &std::path::Path) -> BatchConfig {
    BatchConfig {
        cache_dir: root.join("cache"),
        checkpoint_dir: root.join("ckpt"),
        result_dir: root.join("results"),
        ..BatchConfig::default()
    }
}

fn result_files(root: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(root.join("results"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test(start_paused = true)]
async fn test_preparation_concurrency_stays_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let structures = GaugedStructures::new();

    let mut registry = BackendRegistry::new();
    registry.register(Simulator::new("aer_local", 32));

    let molecules: Vec<MoleculeSpec> =
        (0..5).map(|i| molecule(&format!("mol_{i}"))).collect();

    let mut cfg = config(dir.path());
    cfg.max_concurrent_preparations = 2;

    let orch = BatchOrchestrator::new(
        Arc::new(registry),
        structures.clone(),
        Arc::new(Programs),
        Kernel::converging(),
        cfg,
    )
    .with_load_source(Arc::new(IdleHost));

    let outcomes = orch.run(&molecules).await.unwrap();

    assert_eq!(outcomes.len(), 5);
    assert!(outcomes.iter().all(|o| o.is_completed()));

    let peak = structures.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "preparation concurrency {peak} exceeded bound");
    assert!(peak >= 2, "preparations never overlapped");
}

#[tokio::test(start_paused = true)]
async fn test_broken_hardware_falls_back_to_simulator() {
    let dir = tempfile::tempdir().unwrap();

    let hardware = BrokenHardware::new("aurora", 127);
    let mut registry = BackendRegistry::new();
    registry.register(hardware.clone());
    registry.register(Simulator::new("aer_local", 127));

    let orch = BatchOrchestrator::new(
        Arc::new(registry),
        GaugedStructures::new(),
        Arc::new(Programs),
        Kernel::converging(),
        config(dir.path()),
    )
    .with_load_source(Arc::new(IdleHost));

    let outcomes = orch.run(&[molecule("h2")]).await.unwrap();

    // Hardware saw the full automatic retry budget before fallback.
    assert_eq!(hardware.submissions.load(Ordering::SeqCst), 3);

    match &outcomes[0] {
        MoleculeOutcome::Completed { record, path, .. } => {
            assert!(record.used_fallback_backend);
            assert_eq!(record.backend, "aer_local");

            let body = std::fs::read_to_string(path).unwrap();
            assert!(body.contains("Backend: aer_local\n"));
            assert!(body.contains("Fallback Used: True\n"));
        }
        other => panic!("expected completion via fallback, got {other:?}"),
    }

    let files = result_files(dir.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("_fallback.txt"));
}

#[tokio::test(start_paused = true)]
async fn test_basis_mismatch_restarts_once_on_fallback_basis() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = Kernel::mismatching();

    let mut registry = BackendRegistry::new();
    registry.register(Simulator::new("aer_local", 64));

    let molecules = vec![molecule("h2o").with_basis_name("6-31g")];
    let orch = BatchOrchestrator::new(
        Arc::new(registry),
        GaugedStructures::new(),
        Arc::new(Programs),
        kernel.clone(),
        config(dir.path()),
    )
    .with_load_source(Arc::new(IdleHost));

    let outcomes = orch.run(&molecules).await.unwrap();

    match &outcomes[0] {
        MoleculeOutcome::Completed { record, path, .. } => {
            assert!(record.used_fallback_basis);
            assert_eq!(record.basis, "sto-3g");
            assert!(record.converged);

            let body = std::fs::read_to_string(path).unwrap();
            assert!(body.contains("Fallback Used: True\n"));
        }
        other => panic!("expected completion via basis fallback, got {other:?}"),
    }

    // One mismatching call on 6-31g, then exactly one converging run
    // (two iterations) on sto-3g.
    assert_eq!(kernel.iterations.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_every_molecule_gets_exactly_one_outcome() {
    let dir = tempfile::tempdir().unwrap();

    let mut registry = BackendRegistry::new();
    registry.register(Simulator::new("aer_local", 16));

    // "giant" cannot fit in 16 qubits; the others can.
    let giant = MoleculeSpec::new(
        "giant",
        (0..30)
            .map(|i| Atom::new("C", [f64::from(i) * 1.4, 0.0, 0.0]))
            .collect(),
    );
    let molecules = vec![molecule("h2"), giant, molecule("lih")];

    let orch = BatchOrchestrator::new(
        Arc::new(registry),
        GaugedStructures::new(),
        Arc::new(Programs),
        Kernel::converging(),
        config(dir.path()),
    )
    .with_load_source(Arc::new(IdleHost));

    let outcomes = orch.run(&molecules).await.unwrap();

    let ids: Vec<&str> = outcomes.iter().map(|o| o.molecule()).collect();
    assert_eq!(ids, vec!["h2", "giant", "lih"]);
    assert!(outcomes[0].is_completed());
    assert!(!outcomes[1].is_completed());
    assert!(outcomes[2].is_completed());

    // Failed molecules leave no result file behind.
    assert_eq!(result_files(dir.path()).len(), 2);
}
