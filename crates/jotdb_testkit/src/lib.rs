//! # jotdb Testkit
//!
//! Test utilities for jotdb.
//!
//! This crate provides:
//! - Store fixtures (versioned, encrypted)
//! - Property-based test generators using proptest
//! - Toy encryptors for exercising the encryption boundary
//!
//! ## Usage
//!
//! ```rust
//! use jotdb_testkit::prelude::*;
//! use serde_json::json;
//!
//! let mut store = versioned_store();
//! store.set("k", json!(1));
//! assert!(store.current_version().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod encryptors;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::encryptors::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use encryptors::*;
pub use fixtures::*;
pub use generators::*;
