//! Execution engine with hardware→simulator fallback.
//!
//! State machine per execution attempt:
//!
//! ```text
//!   Idle ──→ SubmittedHardware ──→ Succeeded
//!                  │
//!                  ▼
//!            FailedHardware ──→ SubmittedSimulator ──→ Succeeded
//!                                      │
//!                                      ▼
//!                                FailedTerminal
//! ```
//!
//! Submissions carry the engine's own automatic bounded retry for the
//! transient infrastructure error class. This is distinct from the
//! interactive retry in `vanir-policy` and the two are never stacked
//! on the same call. There is no cycle back to `Idle` within one
//! orchestrator-level attempt.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use vanir_chem::MoleculeSpec;
use vanir_hal::{
    Backend, BackendDescriptor, BackendKind, BackendRegistry, ExecutionRecord, HalError,
    ProgramHandle, SampleData,
};

use crate::config::BatchConfig;
use crate::error::{SchedError, SchedResult};
use crate::selector::{self, BackendAssignment};

/// Phases of one execution attempt. Tracked for logging; terminal
/// phases are `Succeeded` and `FailedTerminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Idle,
    SubmittedHardware,
    Succeeded,
    FailedHardware,
    SubmittedSimulator,
    FailedTerminal,
}

impl std::fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutionPhase::Idle => "Idle",
            ExecutionPhase::SubmittedHardware => "SubmittedHardware",
            ExecutionPhase::Succeeded => "Succeeded",
            ExecutionPhase::FailedHardware => "FailedHardware",
            ExecutionPhase::SubmittedSimulator => "SubmittedSimulator",
            ExecutionPhase::FailedTerminal => "FailedTerminal",
        };
        write!(f, "{name}")
    }
}

/// Submits prepared programs and applies the backend fallback policy.
pub struct ExecutionEngine {
    registry: Arc<BackendRegistry>,
    retries: u32,
    retry_delay: Duration,
    load_factor: f64,
}

impl ExecutionEngine {
    /// Create an engine over a backend registry.
    pub fn new(registry: Arc<BackendRegistry>, config: &BatchConfig) -> Self {
        Self {
            registry,
            retries: config.submit_retries,
            retry_delay: config.submit_retry_delay,
            load_factor: config.load_factor,
        }
    }

    /// Submit a program and wait for samples, retrying transient
    /// failures automatically. Permanent failures return immediately.
    async fn submit_with_retry(
        &self,
        backend: &Arc<dyn Backend>,
        program: &ProgramHandle,
        shots: u32,
    ) -> Result<SampleData, HalError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = async {
                let job_id = backend.submit(program, shots).await?;
                info!(backend = backend.name(), job = %job_id, "Job submitted");
                backend.wait(&job_id).await
            }
            .await;

            match outcome {
                Ok(samples) => {
                    info!(
                        backend = backend.name(),
                        job = %samples.job_id,
                        shots = samples.counts.total_shots(),
                        "Job completed"
                    );
                    return Ok(samples);
                }
                Err(e) if e.is_transient() && attempt < self.retries => {
                    warn!(
                        backend = backend.name(),
                        attempt,
                        retries = self.retries,
                        error = %e,
                        "Transient submission failure, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Execute a prepared program on its assigned backend, falling back
    /// to a re-selected simulator when the hardware path is exhausted.
    ///
    /// Returns an [`ExecutionRecord`] naming the backend actually used;
    /// a failed attempt never produces a record.
    pub async fn execute(
        &self,
        spec: &MoleculeSpec,
        assignment: &BackendAssignment,
        program: &ProgramHandle,
        snapshot: &[BackendDescriptor],
        shots: u32,
    ) -> SchedResult<ExecutionRecord> {
        let primary = self.registry.get(&assignment.backend)?;

        let mut phase = match primary.kind() {
            BackendKind::Hardware => ExecutionPhase::SubmittedHardware,
            // A simulator assignment skips the fallback tier entirely.
            BackendKind::Simulator => ExecutionPhase::SubmittedSimulator,
        };
        info!(molecule = %spec.id, backend = %assignment.backend, %phase, "Submitting prepared program");

        let primary_error = match self.submit_with_retry(&primary, program, shots).await {
            Ok(samples) => {
                info!(molecule = %spec.id, phase = %ExecutionPhase::Succeeded, "Execution succeeded");
                return Ok(ExecutionRecord {
                    job_id: samples.job_id.clone(),
                    backend: samples.backend.clone(),
                    samples,
                    used_fallback_backend: false,
                });
            }
            Err(e) => e,
        };

        if phase == ExecutionPhase::SubmittedSimulator {
            error!(
                molecule = %spec.id,
                backend = %assignment.backend,
                phase = %ExecutionPhase::FailedTerminal,
                error = %primary_error,
                "Simulator execution failed, no further fallback"
            );
            return Err(SchedError::ExecutionTerminal {
                molecule: spec.id.clone(),
                reason: primary_error.to_string(),
            });
        }

        phase = ExecutionPhase::FailedHardware;
        warn!(
            molecule = %spec.id,
            backend = %assignment.backend,
            %phase,
            error = %primary_error,
            "Hardware retries exhausted, falling back to simulator"
        );

        let fallback =
            selector::reselect(spec, assignment, snapshot, self.load_factor).map_err(|e| {
                SchedError::ExecutionTerminal {
                    molecule: spec.id.clone(),
                    reason: format!("hardware failed ({primary_error}); {e}"),
                }
            })?;
        let simulator = self.registry.get(&fallback.backend)?;

        phase = ExecutionPhase::SubmittedSimulator;
        info!(molecule = %spec.id, backend = %fallback.backend, %phase, "Resubmitting to simulator");

        match self.submit_with_retry(&simulator, program, shots).await {
            Ok(samples) => {
                info!(
                    molecule = %spec.id,
                    backend = %fallback.backend,
                    phase = %ExecutionPhase::Succeeded,
                    "Fallback execution succeeded"
                );
                Ok(ExecutionRecord {
                    job_id: samples.job_id.clone(),
                    backend: samples.backend.clone(),
                    samples,
                    used_fallback_backend: true,
                })
            }
            Err(e) => {
                error!(
                    molecule = %spec.id,
                    backend = %fallback.backend,
                    phase = %ExecutionPhase::FailedTerminal,
                    error = %e,
                    "Simulator fallback failed"
                );
                Err(SchedError::ExecutionTerminal {
                    molecule: spec.id.clone(),
                    reason: format!("hardware failed ({primary_error}); simulator failed ({e})"),
                })
            }
        }
    }
}
