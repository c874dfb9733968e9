//! Backend trait definition.

use crate::error::{StorageError, StorageResult};
use serde_json::Value;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// A key–value backend for jotdb.
///
/// Backends own a single `string → JSON` map and expose raw map operations.
/// Everything layered above them (cache accounting, queues, the version log)
/// is expressed in terms of this contract, so a backend does not interpret
/// key namespaces or value shapes.
///
/// # Invariants
///
/// - Keys are non-empty strings
/// - Values round-trip through `serde_json`
/// - `set` overwrites an existing key in place
/// - `keys("*")` returns every live key
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - the in-process map, optionally shared
///   between handles through a [`super::BackendRegistry`]
pub trait KvBackend {
    /// Returns a stable identity for the underlying map.
    ///
    /// Two backends that share one map report the same identity.
    fn id(&self) -> Uuid;

    /// Returns true if this backend was obtained from a registry and
    /// therefore shares its map with other handles.
    fn is_shared(&self) -> bool;

    /// Returns true if the key is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Reads a value, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Writes a value, overwriting any existing entry for the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&mut self, key: &str, value: Value) -> StorageResult<()>;

    /// Removes a key. Returns false if it was absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn erase(&mut self, key: &str) -> StorageResult<bool>;

    /// Returns every key matching a glob pattern (see [`crate::glob_match`]).
    ///
    /// `"*"` returns all keys. Order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn keys(&self, pattern: &str) -> StorageResult<Vec<String>>;

    /// Removes every key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn clean(&mut self) -> StorageResult<()> {
        for key in self.keys("*")? {
            self.erase(&key)?;
        }
        Ok(())
    }

    /// Serializes the whole map as a JSON object string.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn dumps(&self) -> StorageResult<String> {
        let mut members = serde_json::Map::new();
        for key in self.keys("*")? {
            if let Some(value) = self.get(&key)? {
                members.insert(key, value);
            }
        }
        Ok(Value::Object(members).to_string())
    }

    /// Parses a JSON object and sets each member.
    ///
    /// Merges into the existing map; it does not clean first. A payload whose
    /// root is not an object fails without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidFormat`] if the payload is not valid
    /// JSON or its root is not an object.
    fn loads(&mut self, json: &str) -> StorageResult<()> {
        let parsed: Value = serde_json::from_str(json)
            .map_err(|e| StorageError::invalid_format(format!("loads: {e}")))?;
        let Value::Object(members) = parsed else {
            return Err(StorageError::invalid_format(
                "loads: root must be a JSON object",
            ));
        };
        for (key, value) in members {
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Writes [`KvBackend::dumps`] output to a file verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error on read or I/O failure.
    fn dump_file(&self, path: &Path) -> StorageResult<()> {
        fs::write(path, self.dumps()?)?;
        Ok(())
    }

    /// Reads a file and merges it via [`KvBackend::loads`].
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or parse failure.
    fn load_file(&mut self, path: &Path) -> StorageResult<()> {
        let text = fs::read_to_string(path)?;
        self.loads(&text)
    }

    /// Returns an approximate byte count for the stored data.
    ///
    /// With `deep` the estimate includes string lengths and JSON content
    /// recursively; without it, only the key set is counted. See
    /// [`crate::sizing`] for the accounting rules.
    fn bytes_used(&self, deep: bool) -> usize;
}
