//! Sample data and execution records.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Measured bitstring counts from one execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleCounts {
    counts: FxHashMap<String, u64>,
}

impl SampleCounts {
    /// Create an empty count map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create counts from an iterator of (bitstring, count) pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, u64)>) -> Self {
        Self {
            counts: pairs.into_iter().collect(),
        }
    }

    /// Record `n` observations of a bitstring.
    pub fn add(&mut self, bitstring: impl Into<String>, n: u64) {
        *self.counts.entry(bitstring.into()).or_insert(0) += n;
    }

    /// Total number of shots recorded.
    pub fn total_shots(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct bitstrings observed.
    pub fn num_outcomes(&self) -> usize {
        self.counts.len()
    }

    /// The most frequent outcome, ties broken by lexical bitstring order
    /// so the answer is deterministic.
    pub fn most_frequent(&self) -> Option<(&str, u64)> {
        self.counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(s, &c)| (s.as_str(), c))
    }

    /// Iterate over (bitstring, count) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(s, &c)| (s.as_str(), c))
    }

    /// Whether no samples were recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Raw sample data returned by a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleData {
    /// Job that produced the samples.
    pub job_id: JobId,
    /// Backend that executed the job.
    pub backend: String,
    /// Measured bitstring counts.
    pub counts: SampleCounts,
}

impl SampleData {
    /// Create sample data for a completed job.
    pub fn new(job_id: impl Into<JobId>, backend: impl Into<String>, counts: SampleCounts) -> Self {
        Self {
            job_id: job_id.into(),
            backend: backend.into(),
            counts,
        }
    }
}

/// Record of one successful execution attempt.
///
/// A failed attempt never produces a record; fallback to a simulator
/// produces one with `used_fallback_backend` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Job identifier on the backend that ran it.
    pub job_id: JobId,
    /// Backend actually used — may differ from the assignment.
    pub backend: String,
    /// Raw sample data.
    pub samples: SampleData,
    /// Whether the hardware→simulator fallback was taken.
    pub used_fallback_backend: bool,
}
