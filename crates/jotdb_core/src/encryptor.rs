//! Encryption boundary for stored values.

use crate::error::CoreResult;
use serde_json::{json, Value};

/// Member name of the wrapper object an encrypted value is stored under.
pub const CIPHER_FIELD: &str = "rjson";

/// A pluggable string encryptor.
///
/// The store is agnostic to the cipher; anything that can round-trip a
/// string works. Only `set` writes are wrapped, as
/// `{"rjson": <ciphertext>}`, and reads unwrap the same shape.
pub trait Encryptor {
    /// Encrypts a plaintext string.
    ///
    /// # Errors
    ///
    /// Returns an error when the plaintext cannot be encrypted.
    fn encrypt_string(&self, plaintext: &str) -> CoreResult<String>;

    /// Decrypts a ciphertext produced by [`Encryptor::encrypt_string`].
    ///
    /// # Errors
    ///
    /// Returns an error when the ciphertext cannot be decrypted.
    fn decrypt_string(&self, ciphertext: &str) -> CoreResult<String>;
}

/// Wraps a ciphertext in the stored-value shape.
#[must_use]
pub fn wrap_ciphertext(ciphertext: String) -> Value {
    json!({ CIPHER_FIELD: ciphertext })
}

/// Returns the ciphertext if the value has the wrapper shape.
#[must_use]
pub fn unwrap_ciphertext(value: &Value) -> Option<&str> {
    value.get(CIPHER_FIELD).and_then(Value::as_str)
}
