//! Named registry of shared backends.
//!
//! A registry maps names to [`MemoryBackend`] handles. Requesting the same
//! name twice yields two handles over one map, which is how process-wide
//! shared storage is expressed: instead of a hidden class-level singleton,
//! callers ask a registry for a named backend and every holder of that name
//! sees every mutation.

use crate::memory::MemoryBackend;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Name used by [`MemoryBackend::shared_default`].
pub const DEFAULT_BACKEND_NAME: &str = "default";

/// A name → backend map producing shared [`MemoryBackend`] handles.
#[derive(Default)]
pub struct BackendRegistry {
    inner: Mutex<HashMap<String, MemoryBackend>>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the named backend, creating it on first request.
    ///
    /// All handles returned for one name share a single map and compare
    /// equal.
    pub fn get_or_create(&self, name: &str) -> MemoryBackend {
        self.inner
            .lock()
            .entry(name.to_string())
            .or_insert_with(MemoryBackend::new_shared)
            .clone()
    }

    /// Returns true if the name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().contains_key(name)
    }

    /// Drops the registry's own handle for a name.
    ///
    /// Existing handles keep working; the next `get_or_create` for the name
    /// starts a fresh map. Returns false if the name was not registered.
    pub fn remove(&self, name: &str) -> bool {
        self.inner.lock().remove(name).is_some()
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

static DEFAULT_REGISTRY: Lazy<BackendRegistry> = Lazy::new(BackendRegistry::new);

/// Returns the process-wide default registry.
///
/// Its backends live from first request to process exit.
#[must_use]
pub fn default_registry() -> &'static BackendRegistry {
    &DEFAULT_REGISTRY
}

impl MemoryBackend {
    /// Returns a handle to a named backend in the default registry.
    #[must_use]
    pub fn shared(name: &str) -> Self {
        default_registry().get_or_create(name)
    }

    /// Returns a handle to the default shared backend.
    #[must_use]
    pub fn shared_default() -> Self {
        Self::shared(DEFAULT_BACKEND_NAME)
    }
}
