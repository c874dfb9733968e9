//! Error types for backend operations.

use std::io;
use thiserror::Error;

/// Result type for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur inside a backend call.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred (file dump/load).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A serialized payload could not be parsed or had the wrong shape.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Any other unexpected failure inside a backend.
    #[error("backend failure: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl StorageError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a backend failure error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
