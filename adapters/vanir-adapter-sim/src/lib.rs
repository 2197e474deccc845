//! Vanir in-process sampling backend.
//!
//! This crate provides everything a batch run needs without external
//! services: a [`SimulatorBackend`] implementing the HAL backend trait
//! with deterministic seeded sampling, and reference implementations of
//! the chemistry collaborator traits backed by closed-form estimates.
//!
//! The simulator samples bitstring distributions; it does not evolve a
//! statevector. That keeps it usable at any qubit count the descriptor
//! advertises, which is exactly what scheduler and fallback testing
//! need. The reference kernel converges geometrically toward a
//! deterministic per-structure target, so end-to-end runs finish within
//! the default iteration budget.
//!
//! # Example
//!
//! ```ignore
//! use vanir_adapter_sim::SimulatorBackend;
//! use vanir_hal::{Backend, ProgramHandle};
//!
//! let backend = SimulatorBackend::new("aer_local", 64);
//! let program = ProgramHandle::new("h2-prog", "aer_local", 8);
//! let job_id = backend.submit(&program, 1024).await?;
//! let samples = backend.wait(&job_id).await?;
//! ```

pub mod backend;
pub mod reference;

pub use backend::SimulatorBackend;
pub use reference::{AnalyticStructureBuilder, LayoutProgramBuilder, ReferenceKernel};
