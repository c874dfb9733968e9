//! Reversible operations and their tagged-array encoding.
//!
//! Every mutation is described by an operation array whose first element is
//! a tag: `["set", key, value]`, `["erase", key]`, `["clean"]`,
//! `["load", path]`, `["loads", body]`. This array shape is the on-disk and
//! on-wire format of the version log; [`Operation`] is only the in-memory
//! view of it.

use crate::error::{CoreError, CoreResult};
use jotdb_storage::KvBackend;
use serde_json::{json, Value};
use std::path::Path;

/// A single reversible edit, as held by the version log.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Write a key.
    Set {
        /// Key to write.
        key: String,
        /// Value to store.
        value: Value,
    },
    /// Erase a key.
    Erase {
        /// Key to remove.
        key: String,
    },
    /// Clear the whole backend.
    Clean,
    /// Read a file and merge its members.
    Load {
        /// Path of the JSON dump to merge.
        path: String,
    },
    /// Merge a serialized JSON object.
    Loads {
        /// The JSON object text.
        body: String,
    },
}

impl Operation {
    /// Returns the operation's tag, which doubles as its event name.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Set { .. } => "set",
            Self::Erase { .. } => "erase",
            Self::Clean => "clean",
            Self::Load { .. } => "load",
            Self::Loads { .. } => "loads",
        }
    }

    /// Encodes the operation as its tagged array.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Set { key, value } => json!(["set", key, value]),
            Self::Erase { key } => json!(["erase", key]),
            Self::Clean => json!(["clean"]),
            Self::Load { path } => json!(["load", path]),
            Self::Loads { body } => json!(["loads", body]),
        }
    }

    /// Decodes a tagged array.
    ///
    /// The `loads` body may be either a JSON string or a JSON value; a value
    /// is serialized so the operation always carries object text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] for anything that is not a
    /// well-formed operation array.
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| CoreError::invalid_format("operation must be an array"))?;
        let tag = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::invalid_format("operation tag must be a string"))?;

        match (tag, items.len()) {
            ("set", 3) => Ok(Self::Set {
                key: Self::key_arg(&items[1])?,
                value: items[2].clone(),
            }),
            ("erase", 2) => Ok(Self::Erase {
                key: Self::key_arg(&items[1])?,
            }),
            ("clean", 1) => Ok(Self::Clean),
            ("load", 2) => Ok(Self::Load {
                path: Self::key_arg(&items[1])?,
            }),
            ("loads", 2) => Ok(Self::Loads {
                body: match &items[1] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            }),
            _ => Err(CoreError::invalid_format(format!(
                "malformed operation array: tag {tag:?} with {} elements",
                items.len()
            ))),
        }
    }

    fn key_arg(value: &Value) -> CoreResult<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CoreError::invalid_format("operation argument must be a string"))
    }
}

/// Applies an operation to a backend, without events or version
/// bookkeeping. This is the replay path used by undo/redo navigation.
///
/// # Errors
///
/// Propagates backend failures.
pub fn apply_operation(backend: &mut dyn KvBackend, op: &Operation) -> CoreResult<()> {
    match op {
        Operation::Set { key, value } => backend.set(key, value.clone())?,
        Operation::Erase { key } => {
            backend.erase(key)?;
        }
        Operation::Clean => backend.clean()?,
        Operation::Load { path } => backend.load_file(Path::new(path))?,
        Operation::Loads { body } => backend.loads(body)?,
    }
    Ok(())
}
