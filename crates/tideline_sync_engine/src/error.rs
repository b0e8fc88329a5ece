//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for remote store calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that abort a sync operation.
///
/// Remote failures are not here: they are absorbed per item and recorded
/// on the queue. Only local failures stop a pass.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Queue, mirror or storage error.
    #[error("local store error: {0}")]
    Core(#[from] tideline_core::CoreError),

    /// Storage error outside the queue and mirror.
    #[error("storage error: {0}")]
    Storage(#[from] tideline_storage::StorageError),

    /// The engine configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The scheduler task stopped abnormally.
    #[error("scheduler stopped: {0}")]
    SchedulerStopped(String),
}

/// A failed remote store call.
///
/// Every variant is treated as retryable: the item stays queued and is
/// attempted again on the next pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote store rejected the operation.
    #[error("store error: {0}")]
    Store(String),

    /// The call did not complete within the request timeout.
    #[error("remote call timed out")]
    Timeout,
}

impl RemoteError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Returns true if the call can be retried.
    pub fn is_retryable(&self) -> bool {
        true
    }
}
