//! Backend descriptors — the scheduler-facing snapshot of a backend.
//!
//! A [`BackendDescriptor`] is what the selector scores: a serializable,
//! point-in-time view of a backend's identity, capacity, and load. The
//! `queue_depth` field is refreshed once per scheduling pass and is
//! advisory only — backend state is soft, not strongly consistent.

use serde::{Deserialize, Serialize};

/// The class of execution service behind a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// A physical quantum device.
    Hardware,
    /// A classical simulator of a quantum device.
    Simulator,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Hardware => write!(f, "hardware"),
            BackendKind::Simulator => write!(f, "simulator"),
        }
    }
}

/// A point-in-time snapshot of a backend for scheduling decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Unique backend name.
    pub name: String,
    /// Hardware or simulator.
    pub kind: BackendKind,
    /// Number of qubits the backend can execute.
    pub qubit_capacity: u32,
    /// Pending jobs at snapshot time. Refreshed per scheduling pass.
    pub queue_depth: u32,
    /// Estimated per-job cost weight, empirically calibrated.
    pub cost_weight: f64,
}

impl BackendDescriptor {
    /// Create a descriptor with zero queue depth and unit cost weight.
    pub fn new(name: impl Into<String>, kind: BackendKind, qubit_capacity: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            qubit_capacity,
            queue_depth: 0,
            cost_weight: 1.0,
        }
    }

    /// Set the current queue depth.
    pub fn with_queue_depth(mut self, depth: u32) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Set the per-job cost weight.
    pub fn with_cost_weight(mut self, weight: f64) -> Self {
        self.cost_weight = weight;
        self
    }

    /// Whether this backend can hold a program needing `qubits` qubits.
    pub fn fits(&self, qubits: u32) -> bool {
        qubits <= self.qubit_capacity
    }

    /// Whether this backend is a simulator.
    pub fn is_simulator(&self) -> bool {
        self.kind == BackendKind::Simulator
    }
}
