//! Vanir Backend Abstraction Layer
//!
//! This crate provides a unified interface for the remote quantum-execution
//! services that Vanir orchestrates batches across, covering hardware devices
//! and simulators behind one trait.
//!
//! # Overview
//!
//! The layer abstracts away backend-specific details, providing:
//! - A common [`Backend`] trait for job submission and sample retrieval
//! - [`BackendDescriptor`] snapshots used by the scheduler's scoring pass
//! - Unified sample handling via [`SampleData`] and [`SampleCounts`]
//! - An [`ExecutionRecord`] tying a completed job to the backend that ran it
//!
//! # Example: Running a Prepared Program
//!
//! ```ignore
//! use vanir_hal::{Backend, ProgramHandle};
//! use vanir_adapter_sim::SimulatorBackend;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SimulatorBackend::new("aer_local", 32);
//!
//!     let program = ProgramHandle::new("h2_sto3g", "aer_local", 8)
//!         .with_optimization_level(3);
//!
//!     let job_id = backend.submit(&program, 1024).await?;
//!     let samples = backend.wait(&job_id).await?;
//!
//!     if let Some((bitstring, count)) = samples.counts.most_frequent() {
//!         println!("Most frequent: {} ({} times)", bitstring, count);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod descriptor;
pub mod error;
pub mod job;
pub mod program;
pub mod registry;
pub mod result;

pub use backend::{Backend, BackendAvailability};
pub use descriptor::{BackendDescriptor, BackendKind};
pub use error::{HalError, HalResult};
pub use job::{JobId, JobStatus};
pub use program::ProgramHandle;
pub use registry::BackendRegistry;
pub use result::{ExecutionRecord, SampleCounts, SampleData};
