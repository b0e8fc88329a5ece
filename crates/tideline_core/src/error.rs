//! Error types for Tideline core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in queue and mirror operations.
///
/// Every variant is local: remote failures never surface here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Durable storage is unavailable, full, or failed.
    #[error("storage error: {0}")]
    Storage(#[from] tideline_storage::StorageError),

    /// A stored document or payload could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// A stored document has an unsupported format version.
    #[error("unsupported format version {found} (expected {expected})")]
    UnsupportedFormat {
        /// Version found in storage.
        found: u16,
        /// Version this build reads and writes.
        expected: u16,
    },

    /// The mutation is malformed and was not queued.
    #[error("invalid mutation: {message}")]
    InvalidMutation {
        /// Why the mutation was rejected.
        message: String,
    },

    /// A client identifier could not be parsed.
    #[error("invalid client id: {0:?}")]
    InvalidClientId(String),

    /// An operation name could not be parsed.
    #[error("unknown operation: {0:?}")]
    UnknownOperation(String),
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid mutation error.
    pub fn invalid_mutation(message: impl Into<String>) -> Self {
        Self::InvalidMutation {
            message: message.into(),
        }
    }

    /// Returns true if this error is a usage error rather than a storage failure.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidMutation { .. }
                | CoreError::InvalidClientId(_)
                | CoreError::UnknownOperation(_)
        )
    }
}
