//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The namespace cannot be mapped onto the backend.
    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),

    /// A stored blob is corrupted or could not be transformed.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The storage directory is missing or is not a directory.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Returns true if the error indicates the device is out of space.
    pub fn is_storage_full(&self) -> bool {
        match self {
            StorageError::Io(e) => {
                // ENOSPC on unix, ERROR_DISK_FULL on windows
                matches!(e.raw_os_error(), Some(28) | Some(112))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_full_detection() {
        let full = StorageError::Io(io::Error::from_raw_os_error(28));
        assert!(full.is_storage_full());

        let other = StorageError::Io(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(!other.is_storage_full());
        assert!(!StorageError::corrupted("bad").is_storage_full());
    }

    #[test]
    fn error_display() {
        let err = StorageError::InvalidNamespace(String::new());
        assert_eq!(err.to_string(), "invalid namespace: \"\"");
    }
}
