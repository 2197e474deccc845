//! Backend registry.
//!
//! Holds the pool of backends a batch run may execute against and
//! produces the descriptor snapshot the scheduler scores. One snapshot
//! is taken per scheduling pass; queue depths inside it go stale and
//! that is acceptable — assignment happens once per batch.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::backend::Backend;
use crate::descriptor::BackendDescriptor;
use crate::error::{HalError, HalResult};

/// Registry of available backends, keyed by name.
#[derive(Default)]
pub struct BackendRegistry {
    backends: FxHashMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend. Replaces any backend with the same name.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Look up a backend by name.
    pub fn get(&self, name: &str) -> HalResult<Arc<dyn Backend>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| HalError::BackendNotFound(name.to_string()))
    }

    /// Names of all registered backends, sorted for determinism.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Take a descriptor snapshot of every registered backend, refreshing
    /// queue depths from `availability()`.
    ///
    /// Backends that fail the availability check keep their cached queue
    /// depth — the snapshot is advisory, not authoritative. Descriptors
    /// are returned in lexical name order.
    pub async fn snapshot(&self) -> Vec<BackendDescriptor> {
        let mut descriptors = Vec::with_capacity(self.backends.len());

        for name in self.names() {
            let backend = &self.backends[&name];
            let mut desc = backend.descriptor().clone();

            match backend.availability().await {
                Ok(avail) => {
                    if let Some(depth) = avail.queue_depth {
                        desc.queue_depth = depth;
                    }
                    if !avail.is_available {
                        warn!(
                            backend = %name,
                            message = avail.status_message.as_deref().unwrap_or("unknown"),
                            "Backend reported unavailable during snapshot"
                        );
                    }
                }
                Err(e) => {
                    warn!(backend = %name, error = %e, "Availability check failed, using cached queue depth");
                }
            }

            descriptors.push(desc);
        }

        descriptors
    }
}
