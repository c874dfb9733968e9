//! Error types for jotdb core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Backend error.
    #[error("storage error: {0}")]
    Storage(#[from] jotdb_storage::StorageError),

    /// A payload had the wrong shape (malformed operation array, corrupt
    /// record row).
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A version navigation target does not exist.
    #[error("unknown version: {version}")]
    UnknownVersion {
        /// The requested version UUID.
        version: String,
    },

    /// The currently active operation was evicted from the version log.
    #[error("current version evicted from the operation log: {version}")]
    CurrentVersionEvicted {
        /// The evicted version UUID.
        version: String,
    },

    /// Encryption or decryption failed.
    #[error("encryption error: {message}")]
    Encryption {
        /// Description of the failure.
        message: String,
    },

    /// A listener callback reported failure.
    ///
    /// Dispatch always swallows this; it exists so callbacks have a typed
    /// way to fail.
    #[error("listener failed: {message}")]
    Listener {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an unknown version error.
    pub fn unknown_version(version: impl Into<String>) -> Self {
        Self::UnknownVersion {
            version: version.into(),
        }
    }

    /// Creates a current-version-evicted error.
    pub fn current_version_evicted(version: impl Into<String>) -> Self {
        Self::CurrentVersionEvicted {
            version: version.into(),
        }
    }

    /// Creates an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption {
            message: message.into(),
        }
    }

    /// Creates a listener failure error.
    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener {
            message: message.into(),
        }
    }
}
