//! Sampling backend implementation.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use tracing::debug;
use uuid::Uuid;

use vanir_hal::{
    Backend, BackendAvailability, BackendDescriptor, BackendKind, HalError, HalResult, JobId,
    JobStatus, ProgramHandle, SampleCounts, SampleData,
};

struct SimJob {
    status: JobStatus,
    samples: Option<SampleCounts>,
}

/// In-process backend producing seeded, deterministic sample counts.
///
/// Sampling happens synchronously at submission; jobs report
/// `Completed` on the first status poll. Submission failures can be
/// injected for fallback testing.
pub struct SimulatorBackend {
    descriptor: BackendDescriptor,
    seed: u64,
    fail_submissions: AtomicU32,
    jobs: Mutex<FxHashMap<JobId, SimJob>>,
}

impl SimulatorBackend {
    /// Create a simulator backend with the given qubit capacity.
    pub fn new(name: impl Into<String>, qubit_capacity: u32) -> Self {
        Self {
            descriptor: BackendDescriptor::new(name, BackendKind::Simulator, qubit_capacity),
            seed: 0x5eed,
            fail_submissions: AtomicU32::new(0),
            jobs: Mutex::new(FxHashMap::default()),
        }
    }

    /// Create a backend that advertises itself as hardware.
    ///
    /// Same sampling path, hardware descriptor kind — used to exercise
    /// the hardware tier and its fallback without real devices.
    pub fn hardware_emulator(name: impl Into<String>, qubit_capacity: u32) -> Self {
        Self {
            descriptor: BackendDescriptor::new(name, BackendKind::Hardware, qubit_capacity)
                .with_cost_weight(0.2),
            seed: 0x5eed,
            fail_submissions: AtomicU32::new(0),
            jobs: Mutex::new(FxHashMap::default()),
        }
    }

    /// Override the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fail the next `n` submissions with a transient error.
    pub fn with_submit_failures(self, n: u32) -> Self {
        self.fail_submissions.store(n, Ordering::SeqCst);
        self
    }

    /// Sample a small multimodal distribution, deterministic per
    /// (seed, program id).
    fn sample(&self, program: &ProgramHandle, shots: u32) -> SampleCounts {
        let mut hasher = std::hash::DefaultHasher::new();
        program.program_id.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(self.seed ^ hasher.finish());

        let width = program.num_qubits as usize;
        let num_patterns = 4.min(1usize << width.min(8));
        let patterns: Vec<String> = (0..num_patterns)
            .map(|_| {
                (0..width)
                    .map(|_| if rng.gen_bool(0.5) { '1' } else { '0' })
                    .collect()
            })
            .collect();

        let mut counts = SampleCounts::new();
        let mut remaining = u64::from(shots);
        for (i, pattern) in patterns.iter().enumerate() {
            let n = if i + 1 == patterns.len() {
                remaining
            } else {
                rng.gen_range(0..=remaining)
            };
            if n > 0 {
                counts.add(pattern.clone(), n);
            }
            remaining -= n;
        }
        counts
    }
}

#[async_trait]
impl Backend for SimulatorBackend {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn availability(&self) -> HalResult<BackendAvailability> {
        Ok(BackendAvailability::always_available())
    }

    async fn submit(&self, program: &ProgramHandle, shots: u32) -> HalResult<JobId> {
        if shots == 0 {
            return Err(HalError::InvalidShots("shots must be positive".to_string()));
        }
        if !self.descriptor.fits(program.num_qubits) {
            return Err(HalError::ProgramTooLarge(format!(
                "{} > {}",
                program.num_qubits, self.descriptor.qubit_capacity
            )));
        }
        if self
            .fail_submissions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(HalError::SubmissionFailed(
                "injected submission failure".to_string(),
            ));
        }

        let job_id = JobId::new(Uuid::new_v4().to_string());
        let counts = self.sample(program, shots);
        debug!(
            backend = self.name(),
            job = %job_id,
            program = %program.program_id,
            shots,
            outcomes = counts.num_outcomes(),
            "Sampled program"
        );

        self.jobs.lock().await.insert(
            job_id.clone(),
            SimJob {
                status: JobStatus::Completed,
                samples: Some(counts),
            },
        );
        Ok(job_id)
    }

    async fn status(&self, job_id: &JobId) -> HalResult<JobStatus> {
        let jobs = self.jobs.lock().await;
        jobs.get(job_id)
            .map(|job| job.status.clone())
            .ok_or_else(|| HalError::JobNotFound(job_id.to_string()))
    }

    async fn result(&self, job_id: &JobId) -> HalResult<SampleData> {
        let jobs = self.jobs.lock().await;
        let job = jobs
            .get(job_id)
            .ok_or_else(|| HalError::JobNotFound(job_id.to_string()))?;
        match &job.samples {
            Some(counts) => Ok(SampleData::new(job_id.clone(), self.name(), counts.clone())),
            None => Err(HalError::JobFailed("no samples recorded".to_string())),
        }
    }

    async fn cancel(&self, job_id: &JobId) -> HalResult<()> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| HalError::JobNotFound(job_id.to_string()))?;
        if !job.status.is_terminal() {
            job.status = JobStatus::Cancelled;
        }
        Ok(())
    }
}
