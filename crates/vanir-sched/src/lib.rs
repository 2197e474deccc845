//! Batch orchestration for sample-based quantum-chemistry runs.
//!
//! This crate is the reliability core of Vanir: it assigns molecules to
//! backends, admits preparation work under host-capacity control, runs
//! the hardware→simulator fallback on submission failure, drives the
//! checkpointed SQD refinement loop with its basis-set fallback, and
//! persists one durable result per molecule per batch.
//!
//! # Pipeline
//!
//! ```text
//!  molecules ──→ selector ──→ Phase 1 (bounded-concurrency preparation)
//!                                 │  capacity gate · memoized structure
//!                                 │  interactive-retry builds · engine submit
//!                                 ▼
//!                           join barrier
//!                                 │
//!                                 ▼
//!                Phase 2 (strictly sequential SQD, checkpointed)
//!                                 │
//!                                 ▼
//!                        result files, one per molecule
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod selector;

pub use config::BatchConfig;
pub use engine::{ExecutionEngine, ExecutionPhase};
pub use error::{SchedError, SchedResult};
pub use orchestrator::{
    BatchOrchestrator, BatchStage, MoleculeOutcome, PreparationPipeline, PreparedCompound, Preparer,
};
pub use report::{ResultRecord, ResultWriter};
pub use runner::{SqdOutcome, SqdRunner};
pub use selector::{analyze_and_assign, reselect, BackendAssignment};
