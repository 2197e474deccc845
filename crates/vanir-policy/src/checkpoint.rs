//! Durable checkpoint/resume.
//!
//! State is persisted under a stable key after every successful step
//! and reloaded on the next run with the same key. Writes are atomic —
//! the full serialized state goes to a temp file which then replaces
//! the previous one — so a reader never observes a half-written
//! checkpoint. Envelopes carry a schema version; a version mismatch is
//! reported as an explicit error instead of being silently
//! misinterpreted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{PolicyError, PolicyResult};

/// Current checkpoint schema version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Versioned envelope persisted for one checkpoint key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState<T> {
    /// Schema version the envelope was written with.
    pub version: u32,
    /// Molecule the state belongs to.
    pub molecule: String,
    /// Index of the most recent successfully completed iteration.
    pub iteration: u32,
    /// Accumulated solver state.
    pub state: T,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

impl<T> CheckpointState<T> {
    /// Wrap a state value in a current-version envelope.
    pub fn new(molecule: impl Into<String>, iteration: u32, state: T) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            molecule: molecule.into(),
            iteration,
            state,
            updated_at: Utc::now(),
        }
    }
}

/// Keyed checkpoint store over a directory.
pub struct Checkpointer {
    dir: PathBuf,
}

impl Checkpointer {
    /// Open (creating if needed) a checkpoint store rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> PolicyResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.ckpt.json"))
    }

    /// Load the persisted state for a key, if any.
    ///
    /// Returns `None` on first run. A version mismatch or undecodable
    /// envelope is an error — resuming from it would misinterpret state.
    pub async fn load<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> PolicyResult<Option<CheckpointState<T>>> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: CheckpointState<T> =
            serde_json::from_str(&content).map_err(|e| PolicyError::CheckpointCorrupt {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        if envelope.version != CHECKPOINT_VERSION {
            return Err(PolicyError::CheckpointVersion {
                key: key.to_string(),
                found: envelope.version,
                expected: CHECKPOINT_VERSION,
            });
        }

        info!(key, iteration = envelope.iteration, "Loaded checkpoint");
        Ok(Some(envelope))
    }

    /// Persist state for a key, atomically replacing any previous state.
    pub async fn store<T: Serialize>(
        &self,
        key: &str,
        envelope: &CheckpointState<T>,
    ) -> PolicyResult<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.ckpt.json.tmp"));

        fs::write(&tmp, serde_json::to_string(envelope)?).await?;
        fs::rename(&tmp, &path).await?;

        debug!(key, iteration = envelope.iteration, "Saved checkpoint");
        Ok(())
    }

    /// Remove the persisted state for a key. Returns whether anything
    /// was removed.
    pub async fn discard(&self, key: &str) -> PolicyResult<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                info!(key, "Discarded checkpoint");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Checkpointed-resume combinator: load prior state for `key`, run
    /// `work` on it, persist whatever it returns, and hand it back.
    ///
    /// `work` decides termination itself — it must treat a non-empty
    /// prior state as "continue from there", not "restart".
    pub async fn resume<T, E, Fut>(
        &self,
        key: &str,
        work: impl FnOnce(Option<CheckpointState<T>>) -> Fut,
    ) -> Result<CheckpointState<T>, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<PolicyError>,
        Fut: Future<Output = Result<CheckpointState<T>, E>>,
    {
        let prior = self.load(key).await.map_err(E::from)?;
        let next = work(prior).await?;
        self.store(key, &next).await.map_err(E::from)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = Checkpointer::new(dir.path()).unwrap();

        let loaded = store.load::<u32>("h2").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_store_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Checkpointer::new(dir.path()).unwrap();

        store
            .store("h2", &CheckpointState::new("h2", 3, vec![1.0f64, 2.0]))
            .await
            .unwrap();

        let loaded = store.load::<Vec<f64>>("h2").await.unwrap().unwrap();
        assert_eq!(loaded.iteration, 3);
        assert_eq!(loaded.state, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_store_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = Checkpointer::new(dir.path()).unwrap();

        store
            .store("h2", &CheckpointState::new("h2", 1, 10u32))
            .await
            .unwrap();
        store
            .store("h2", &CheckpointState::new("h2", 2, 20u32))
            .await
            .unwrap();

        let loaded = store.load::<u32>("h2").await.unwrap().unwrap();
        assert_eq!(loaded.iteration, 2);
        assert_eq!(loaded.state, 20);
    }

    #[tokio::test]
    async fn test_version_mismatch_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Checkpointer::new(dir.path()).unwrap();

        let mut envelope = CheckpointState::new("h2", 1, 10u32);
        envelope.version = CHECKPOINT_VERSION + 1;
        store.store("h2", &envelope).await.unwrap();

        let err = store.load::<u32>("h2").await.unwrap_err();
        assert!(matches!(err, PolicyError::CheckpointVersion { .. }));
    }

    #[tokio::test]
    async fn test_discard() {
        let dir = tempfile::tempdir().unwrap();
        let store = Checkpointer::new(dir.path()).unwrap();

        store
            .store("h2", &CheckpointState::new("h2", 1, 10u32))
            .await
            .unwrap();

        assert!(store.discard("h2").await.unwrap());
        assert!(!store.discard("h2").await.unwrap());
        assert!(store.load::<u32>("h2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_persists_returned_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = Checkpointer::new(dir.path()).unwrap();

        let out = store
            .resume("h2", |prior: Option<CheckpointState<u32>>| async move {
                assert!(prior.is_none());
                Ok::<_, PolicyError>(CheckpointState::new("h2", 1, 5u32))
            })
            .await
            .unwrap();
        assert_eq!(out.state, 5);

        let out = store
            .resume("h2", |prior: Option<CheckpointState<u32>>| async move {
                let prior = prior.unwrap();
                Ok::<_, PolicyError>(CheckpointState::new("h2", prior.iteration + 1, prior.state + 1))
            })
            .await
            .unwrap();
        assert_eq!(out.iteration, 2);
        assert_eq!(out.state, 6);
    }
}
