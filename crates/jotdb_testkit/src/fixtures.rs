//! Store fixtures.

use crate::encryptors::Base64Encryptor;
use jotdb_core::Store;
use serde_json::{json, Value};

/// A store with version control on and the default warning limit.
#[must_use]
pub fn versioned_store() -> Store {
    Store::builder().version_control(true).build()
}

/// A store that wraps written values with the [`Base64Encryptor`].
#[must_use]
pub fn encrypted_store() -> Store {
    Store::builder().encryptor(Base64Encryptor).build()
}

/// An assortment of JSON values covering every variant.
#[must_use]
pub fn sample_values() -> Vec<Value> {
    vec![
        Value::Null,
        json!(true),
        json!(0),
        json!(-42),
        json!(3.25),
        json!(""),
        json!("plain text"),
        json!([]),
        json!([1, "two", null]),
        json!({}),
        json!({"nested": {"deep": [true, {"deeper": null}]}}),
    ]
}
