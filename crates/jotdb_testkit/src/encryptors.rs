//! Toy encryptors for tests.
//!
//! These are deliberately weak. They exist to exercise the encryption
//! boundary (wrapping, unwrapping, failure translation), not to protect
//! anything.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use jotdb_core::{CoreError, CoreResult, Encryptor};

/// A reversible "cipher" that base64-encodes the plaintext.
///
/// Useful for asserting that stored bytes differ from the logical value
/// while reads still round-trip.
#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Encryptor;

impl Encryptor for Base64Encryptor {
    fn encrypt_string(&self, plaintext: &str) -> CoreResult<String> {
        Ok(STANDARD.encode(plaintext.as_bytes()))
    }

    fn decrypt_string(&self, ciphertext: &str) -> CoreResult<String> {
        let bytes = STANDARD
            .decode(ciphertext)
            .map_err(|e| CoreError::encryption(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| CoreError::encryption(e.to_string()))
    }
}

/// An encryptor that refuses every call, for failure-path tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingEncryptor;

impl Encryptor for FailingEncryptor {
    fn encrypt_string(&self, _plaintext: &str) -> CoreResult<String> {
        Err(CoreError::encryption("FailingEncryptor never encrypts"))
    }

    fn decrypt_string(&self, _ciphertext: &str) -> CoreResult<String> {
        Err(CoreError::encryption("FailingEncryptor never decrypts"))
    }
}
