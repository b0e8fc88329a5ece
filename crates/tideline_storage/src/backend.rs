//! Storage backend trait definition.

use crate::error::StorageResult;

/// Closure applied by [`StorageBackend::update`].
///
/// Receives the current blob (if any) and returns the blob to store.
pub type UpdateFn<'a> = dyn FnMut(Option<Vec<u8>>) -> StorageResult<Vec<u8>> + 'a;

/// A durable storage backend for Tideline.
///
/// Storage backends are **opaque blob stores** keyed by namespace. Tideline
/// owns all encoding; backends never look inside a blob.
///
/// # Invariants
///
/// - `read` returns exactly the bytes of the last successful `write` or
///   `update` for that namespace
/// - `update` is atomic: no other `write`, `update` or `remove` on the same
///   namespace interleaves between its read and its write, including
///   writers using a different handle on the same storage
/// - A failed `update` leaves the namespace unchanged
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads the blob stored under `namespace`.
    ///
    /// Returns `None` if nothing was ever written there.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    fn read(&self, namespace: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the blob stored under `namespace`.
    ///
    /// After this returns successfully the blob survives process
    /// termination (for durable backends).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (I/O failure, storage full).
    fn write(&self, namespace: &str, blob: &[u8]) -> StorageResult<()>;

    /// Atomically reads, transforms and writes back a namespace.
    ///
    /// If `f` returns an error nothing is written and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error from `f` or from the underlying read/write.
    fn update(&self, namespace: &str, f: &mut UpdateFn<'_>) -> StorageResult<()>;

    /// Removes a namespace. Removing a missing namespace is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be modified.
    fn remove(&self, namespace: &str) -> StorageResult<()>;

    /// Lists all namespaces currently holding a blob, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be enumerated.
    fn namespaces(&self) -> StorageResult<Vec<String>>;
}
