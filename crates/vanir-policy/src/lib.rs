//! Reliability policy combinators.
//!
//! Generic wrappers applicable to any unit of work, applied by explicit
//! composition at call sites:
//!
//! - [`MemoCache`] — memoize-with-expiry over a disk-backed keyed store
//! - [`retry_with_signal`] — bounded retry with an interactive
//!   "retry now" signal that short-circuits the inter-attempt wait
//! - [`Checkpointer`] — durable checkpoint/resume with versioned,
//!   atomically replaced state
//! - [`CapacityMonitor`] — admission control that blocks new work while
//!   the host is overloaded
//!
//! Each policy is independent; the orchestration layer composes them
//! per operation. The interactive retry and the execution engine's own
//! automatic retry are mutually exclusive on the same call — stacking
//! them multiplies attempts.

pub mod capacity;
pub mod checkpoint;
pub mod error;
pub mod memo;
pub mod retry;

pub use capacity::{CapacityMonitor, LoadSample, LoadSource, ProcLoadSource};
pub use checkpoint::{CheckpointState, Checkpointer, CHECKPOINT_VERSION};
pub use error::{PolicyError, PolicyResult};
pub use memo::MemoCache;
pub use retry::{retry_with_signal, RetryPolicy, RetrySignal};
