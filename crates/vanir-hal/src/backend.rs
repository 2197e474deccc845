//! Backend trait.
//!
//! The [`Backend`] trait defines the lifecycle for interacting with a
//! quantum-execution service:
//!
//! ```text
//!   descriptor() ──→ submit() ──→ status() ──→ result()
//!    (sync, &ref)     (async)      (async)      (async)
//! ```
//!
//! ## Design principles
//!
//! - **Async-native**: all I/O methods are async.
//! - **Thread-safe**: `Send + Sync` bound enables shared ownership.
//! - **Infallible introspection**: `descriptor()` is synchronous and
//!   infallible — a backend that cannot report its descriptor without
//!   I/O is not correctly initialized. Queue depth in the cached
//!   descriptor may be stale; `availability()` refreshes it.

use std::time::Duration;

use async_trait::async_trait;

use crate::descriptor::{BackendDescriptor, BackendKind};
use crate::error::HalResult;
use crate::job::{JobId, JobStatus};
use crate::program::ProgramHandle;
use crate::result::SampleData;

/// Live availability information for a backend.
#[derive(Debug, Clone)]
pub struct BackendAvailability {
    /// Whether the backend is currently accepting jobs.
    pub is_available: bool,
    /// Number of jobs currently in queue (if known).
    pub queue_depth: Option<u32>,
    /// Human-readable status message.
    pub status_message: Option<String>,
}

impl BackendAvailability {
    /// Availability for a backend that is always available.
    ///
    /// Typical for simulators — zero queue, zero wait.
    pub fn always_available() -> Self {
        Self {
            is_available: true,
            queue_depth: Some(0),
            status_message: None,
        }
    }

    /// Availability for an offline backend.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            is_available: false,
            queue_depth: None,
            status_message: Some(reason.into()),
        }
    }

    /// Availability with a known queue depth.
    pub fn with_queue_depth(depth: u32) -> Self {
        Self {
            is_available: true,
            queue_depth: Some(depth),
            status_message: None,
        }
    }
}

/// Trait for quantum-execution backends.
///
/// # Contract
///
/// - `descriptor()` MUST be synchronous and infallible; descriptors are
///   cached at construction time.
/// - `availability()` SHOULD perform a lightweight liveness check.
/// - `submit()` MUST return a `JobId` with initial status `Queued`.
/// - `result()` MUST only be called when status is `Completed`.
/// - `wait()` has a default implementation (500ms poll, 5-minute timeout).
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Get the backend kind (hardware or simulator).
    fn kind(&self) -> BackendKind {
        self.descriptor().kind
    }

    /// Get the cached descriptor of this backend.
    fn descriptor(&self) -> &BackendDescriptor;

    /// Check backend availability with queue depth information.
    async fn availability(&self) -> HalResult<BackendAvailability>;

    /// Submit a prepared program for execution.
    ///
    /// Returns a job ID that can be used to check status and retrieve
    /// samples. The job MUST start in `Queued` status.
    async fn submit(&self, program: &ProgramHandle, shots: u32) -> HalResult<JobId>;

    /// Get the status of a job.
    async fn status(&self, job_id: &JobId) -> HalResult<JobStatus>;

    /// Get the sample data of a completed job.
    ///
    /// MUST only be called when `status()` returns `Completed`.
    async fn result(&self, job_id: &JobId) -> HalResult<SampleData>;

    /// Cancel a running job.
    async fn cancel(&self, job_id: &JobId) -> HalResult<()>;

    /// Wait for a job to complete and return its samples.
    ///
    /// Default implementation polls every 500ms for up to 5 minutes.
    async fn wait(&self, job_id: &JobId) -> HalResult<SampleData> {
        use crate::error::HalError;
        use tokio::time::sleep;

        let poll_interval = Duration::from_millis(500);
        let max_polls = 600; // 5 minutes max

        for _ in 0..max_polls {
            let status = self.status(job_id).await?;

            match status {
                JobStatus::Completed => return self.result(job_id).await,
                JobStatus::Failed(msg) => return Err(HalError::JobFailed(msg)),
                JobStatus::Cancelled => return Err(HalError::JobCancelled),
                JobStatus::Queued | JobStatus::Running => {
                    sleep(poll_interval).await;
                }
            }
        }

        Err(HalError::Timeout(job_id.0.clone()))
    }
}
