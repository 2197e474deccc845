//! Durable result files.
//!
//! One file per molecule per batch, written at the end of Phase 2. The
//! text header carries the fields operators grep for; the `Full Result`
//! line carries the complete record as JSON for downstream tooling.
//! Filenames are timestamped so consecutive batches never overwrite
//! each other, with a `_fallback` suffix when either fallback path ran.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::SchedResult;
use crate::runner::SqdOutcome;

/// Complete record of one molecule's batch outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Molecule identifier.
    pub molecule: String,
    /// Backend that executed the sampling job.
    pub backend: String,
    /// Job identifier on that backend.
    pub job_id: String,
    /// Basis set the energy was computed under.
    pub basis: String,
    /// Total SQD energy, nuclear repulsion included.
    pub energy: f64,
    /// Refinement iterations completed.
    pub iterations: u32,
    /// Whether the refinement converged within tolerance.
    pub converged: bool,
    /// Whether the hardware→simulator fallback ran.
    pub used_fallback_backend: bool,
    /// Whether the basis-set fallback ran.
    pub used_fallback_basis: bool,
    /// Record creation time.
    pub timestamp: DateTime<Utc>,
}

impl ResultRecord {
    /// Build a record from a finished refinement outcome.
    pub fn from_outcome(outcome: &SqdOutcome) -> Self {
        Self {
            molecule: outcome.molecule.clone(),
            backend: outcome.compound.execution.backend.clone(),
            job_id: outcome.compound.execution.job_id.to_string(),
            basis: outcome.basis.clone(),
            energy: outcome.energy,
            iterations: outcome.iterations,
            converged: outcome.converged,
            used_fallback_backend: outcome.compound.execution.used_fallback_backend,
            used_fallback_basis: outcome.used_fallback_basis,
            timestamp: Utc::now(),
        }
    }

    /// Whether any fallback path (backend or basis) ran.
    pub fn fallback_used(&self) -> bool {
        self.used_fallback_backend || self.used_fallback_basis
    }

    /// File name for this record, unique per molecule per batch.
    pub fn file_name(&self) -> String {
        let stamp = self.timestamp.format("%Y%m%d_%H%M%S");
        if self.fallback_used() {
            format!("result_{}_{stamp}_fallback.txt", self.molecule)
        } else {
            format!("result_{}_{stamp}.txt", self.molecule)
        }
    }

    /// Render the file body.
    pub fn render(&self) -> SchedResult<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!(
            "Molecule: {}\n\
             Backend: {}\n\
             Quantum Job ID: {}\n\
             SQD Energy: {:.6}\n\
             Fallback Used: {}\n\
             Timestamp: {}\n\
             Full Result: {}\n",
            self.molecule,
            self.backend,
            self.job_id,
            self.energy,
            if self.fallback_used() { "True" } else { "False" },
            self.timestamp.to_rfc3339(),
            json,
        ))
    }
}

/// Writes result records under a directory.
pub struct ResultWriter {
    dir: PathBuf,
}

impl ResultWriter {
    /// Create a writer rooted at `dir` (created if absent).
    pub fn new(dir: impl AsRef<Path>) -> SchedResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Persist one record; returns the path written.
    pub async fn write(&self, record: &ResultRecord) -> SchedResult<PathBuf> {
        let path = self.dir.join(record.file_name());
        fs::write(&path, record.render()?).await?;
        info!(
            molecule = %record.molecule,
            path = %path.display(),
            energy = record.energy,
            converged = record.converged,
            "Result written"
        );
        Ok(path)
    }
}
