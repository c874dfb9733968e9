//! In-memory backend.

use crate::backend::KvBackend;
use crate::error::StorageResult;
use crate::glob::glob_match;
use crate::sizing;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// An in-memory key–value backend.
///
/// `MemoryBackend` is a cheap handle: cloning it yields a second handle to
/// the **same** map, and two handles to one map compare equal. A backend
/// constructed with [`MemoryBackend::new`] owns a private map; one obtained
/// from a [`crate::BackendRegistry`] shares its map with every other handle
/// the registry produced for that name.
///
/// # Example
///
/// ```
/// use jotdb_storage::{KvBackend, MemoryBackend};
/// use serde_json::json;
///
/// let mut backend = MemoryBackend::new();
/// backend.set("alpha", json!({"n": 1})).unwrap();
/// assert!(backend.exists("alpha").unwrap());
///
/// let mut other = backend.clone();
/// other.erase("alpha").unwrap();
/// assert!(!backend.exists("alpha").unwrap());
/// ```
#[derive(Clone)]
pub struct MemoryBackend {
    id: Uuid,
    shared: bool,
    map: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryBackend {
    /// Creates a backend with a fresh private map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            shared: false,
            map: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a handle flagged as shared. Used by the registry.
    pub(crate) fn new_shared() -> Self {
        Self {
            shared: true,
            ..Self::new()
        }
    }

    /// Returns the number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Returns true if both handles point at the same underlying map.
    #[must_use]
    pub fn same_map(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.map, &other.map)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for MemoryBackend {
    fn eq(&self, other: &Self) -> bool {
        self.same_map(other)
    }
}

impl Eq for MemoryBackend {}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("id", &self.id)
            .field("shared", &self.shared)
            .field("len", &self.len())
            .finish()
    }
}

impl KvBackend for MemoryBackend {
    fn id(&self) -> Uuid {
        self.id
    }

    fn is_shared(&self) -> bool {
        self.shared
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.map.read().contains_key(key))
    }

    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> StorageResult<()> {
        self.map.write().insert(key.to_string(), value);
        Ok(())
    }

    fn erase(&mut self, key: &str) -> StorageResult<bool> {
        Ok(self.map.write().remove(key).is_some())
    }

    fn keys(&self, pattern: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .map
            .read()
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }

    fn clean(&mut self) -> StorageResult<()> {
        self.map.write().clear();
        Ok(())
    }

    fn bytes_used(&self, deep: bool) -> usize {
        let map = self.map.read();
        let keys: usize = map.keys().map(|k| sizing::string_size(k)).sum();
        if deep {
            sizing::CONTAINER_OVERHEAD
                + keys
                + map.values().map(sizing::value_size).sum::<usize>()
        } else {
            sizing::CONTAINER_OVERHEAD + keys
        }
    }
}
