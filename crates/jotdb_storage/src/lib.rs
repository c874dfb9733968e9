//! # jotdb Storage
//!
//! Backend contract and in-memory backend for jotdb.
//!
//! This crate provides the lowest layer of the store: a `string → JSON`
//! map behind the [`KvBackend`] trait, plus the leaf utilities the layers
//! above build on.
//!
//! ## Design Principles
//!
//! - Backends own exactly one map and expose raw operations; they do not
//!   interpret key namespaces or value shapes
//! - Shared storage is explicit: a [`BackendRegistry`] hands out named
//!   handles, and handles over one map compare equal
//! - Byte accounting is a stable approximation (see [`sizing`]), not a heap
//!   measurement
//!
//! ## Example
//!
//! ```
//! use jotdb_storage::{KvBackend, MemoryBackend};
//! use serde_json::json;
//!
//! let mut backend = MemoryBackend::new();
//! backend.set("alpha", json!({"n": 1})).unwrap();
//! assert_eq!(backend.keys("a*").unwrap(), vec!["alpha".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod glob;
mod memory;
mod registry;
pub mod sizing;

pub use backend::KvBackend;
pub use error::{StorageError, StorageResult};
pub use glob::glob_match;
pub use memory::MemoryBackend;
pub use registry::{default_registry, BackendRegistry, DEFAULT_BACKEND_NAME};
