//! Memoize-with-expiry over a disk-backed keyed store.
//!
//! Cache keys are deterministic: the wrapped operation's name plus an
//! order-sensitive digest of its serialized arguments, so equal
//! arguments always hit the same entry. Entries carry a stored-at
//! stamp; stale entries are evicted lazily on the next lookup — there
//! is no background sweep.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{PolicyError, PolicyResult};

/// Envelope written to disk for each cached value.
#[derive(Debug, Serialize, Deserialize)]
struct MemoEntry {
    stored_at: DateTime<Utc>,
    value: serde_json::Value,
}

/// Disk-backed memoization cache with per-entry expiry.
///
/// At most one stored value exists per key at a time: a recompute
/// overwrites the entry in place.
pub struct MemoCache {
    dir: PathBuf,
    ttl: Duration,
}

impl MemoCache {
    /// Default entry time-to-live: 24 hours.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>, ttl: Duration) -> PolicyResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, ttl })
    }

    /// Open a cache with the default 24-hour TTL.
    pub fn with_default_ttl(dir: impl AsRef<Path>) -> PolicyResult<Self> {
        Self::new(dir, Self::DEFAULT_TTL)
    }

    /// Compute the deterministic cache key for an operation + arguments.
    ///
    /// Arguments are serialized to JSON and hashed; JSON encoding of a
    /// tuple/struct is order-sensitive, so equal arguments in equal
    /// order produce equal keys.
    pub fn key_for<A: Serialize + ?Sized>(op_name: &str, args: &A) -> PolicyResult<String> {
        let encoded = serde_json::to_string(args)?;
        let mut hasher = std::hash::DefaultHasher::new();
        encoded.hash(&mut hasher);
        Ok(format!("{op_name}_{:016x}", hasher.finish()))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Return the cached value for an operation, or invoke `compute`,
    /// store its result under a fresh expiry stamp, and return it.
    ///
    /// The underlying operation is invoked at most once per key within
    /// the TTL window. A corrupt entry is treated as a miss.
    pub async fn get_or_compute<A, T, E, Fut>(
        &self,
        op_name: &str,
        args: &A,
        compute: impl FnOnce() -> Fut,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        E: From<PolicyError>,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = Self::key_for(op_name, args).map_err(E::from)?;

        if let Some(value) = self.lookup(&key).await.map_err(E::from)? {
            debug!(op = op_name, key, "Memo hit");
            return Ok(value);
        }

        let value = compute().await?;
        self.store(&key, &value).await.map_err(E::from)?;
        debug!(op = op_name, key, "Memo stored");
        Ok(value)
    }

    /// Look up a fresh entry, evicting it if expired.
    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> PolicyResult<Option<T>> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: MemoEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Dropping corrupt memo entry");
                let _ = fs::remove_file(&path).await;
                return Ok(None);
            }
        };

        let age = Utc::now().signed_duration_since(entry.stored_at);
        if age.num_seconds() < 0 || age.to_std().is_ok_and(|age| age > self.ttl) {
            debug!(key, "Evicting expired memo entry");
            let _ = fs::remove_file(&path).await;
            return Ok(None);
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Dropping undecodable memo value");
                let _ = fs::remove_file(&path).await;
                Ok(None)
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) -> PolicyResult<()> {
        let entry = MemoEntry {
            stored_at: Utc::now(),
            value: serde_json::to_value(value)?,
        };
        fs::write(self.entry_path(key), serde_json::to_string(&entry)?).await?;
        Ok(())
    }

    /// Remove every entry. Used at the start of a fresh batch run.
    pub async fn clear(&self) -> PolicyResult<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MemoCache::with_default_ttl(dir.path()).unwrap();
        let invocations = AtomicU32::new(0);

        for _ in 0..2 {
            let value: u64 = cache
                .get_or_compute("double", &21u64, || async {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, PolicyError>(42u64)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_args_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MemoCache::with_default_ttl(dir.path()).unwrap();

        let a: u64 = cache
            .get_or_compute("id", &1u64, || async { Ok::<_, PolicyError>(1u64) })
            .await
            .unwrap();
        let b: u64 = cache
            .get_or_compute("id", &2u64, || async { Ok::<_, PolicyError>(2u64) })
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_expired_entry_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MemoCache::with_default_ttl(dir.path()).unwrap();
        let invocations = AtomicU32::new(0);

        let compute = || async {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, PolicyError>("answer".to_string())
        };
        let _: String = cache.get_or_compute("slow", &7u8, compute).await.unwrap();

        // Rewind the stored-at stamp past the TTL.
        let key = MemoCache::key_for("slow", &7u8).unwrap();
        let path = cache.entry_path(&key);
        let mut entry: MemoEntry =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        entry.stored_at = Utc::now() - chrono::Duration::hours(25);
        std::fs::write(&path, serde_json::to_string(&entry).unwrap()).unwrap();

        let compute = || async {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, PolicyError>("answer".to_string())
        };
        let _: String = cache.get_or_compute("slow", &7u8, compute).await.unwrap();
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MemoCache::with_default_ttl(dir.path()).unwrap();

        let key = MemoCache::key_for("op", &0u8).unwrap();
        std::fs::write(cache.entry_path(&key), "not json").unwrap();

        let value: u8 = cache
            .get_or_compute("op", &0u8, || async { Ok::<_, PolicyError>(9u8) })
            .await
            .unwrap();
        assert_eq!(value, 9);
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MemoCache::with_default_ttl(dir.path()).unwrap();
        let _: u8 = cache
            .get_or_compute("op", &0u8, || async { Ok::<_, PolicyError>(1u8) })
            .await
            .unwrap();

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert_eq!(cache.clear().await.unwrap(), 0);
    }

    #[test]
    fn test_key_determinism() {
        let k1 = MemoCache::key_for("op", &("h2o", 3u32)).unwrap();
        let k2 = MemoCache::key_for("op", &("h2o", 3u32)).unwrap();
        let k3 = MemoCache::key_for("op", &(3u32, "h2o")).unwrap();
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
