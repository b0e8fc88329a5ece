//! In-memory storage backend for testing.

use crate::backend::{StorageBackend, UpdateFn};
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory storage backend.
///
/// This backend stores all blobs in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral clients that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe. Share it behind an `Arc` to model several
/// clients working against the same storage.
///
/// # Example
///
/// ```rust
/// use tideline_storage::{StorageBackend, InMemoryBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.write("local_users", b"{}").unwrap();
/// assert_eq!(backend.namespaces().unwrap(), vec!["local_users".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of namespaces holding a blob.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns true if no namespace holds a blob.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Clears all blobs from the backend.
    pub fn clear(&self) {
        self.blobs.write().clear();
    }
}

impl StorageBackend for InMemoryBackend {
    fn read(&self, namespace: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(namespace).cloned())
    }

    fn write(&self, namespace: &str, blob: &[u8]) -> StorageResult<()> {
        self.blobs
            .write()
            .insert(namespace.to_string(), blob.to_vec());
        Ok(())
    }

    fn update(&self, namespace: &str, f: &mut UpdateFn<'_>) -> StorageResult<()> {
        let mut blobs = self.blobs.write();
        let current = blobs.get(namespace).cloned();
        let next = f(current)?;
        blobs.insert(namespace.to_string(), next);
        Ok(())
    }

    fn remove(&self, namespace: &str) -> StorageResult<()> {
        self.blobs.write().remove(namespace);
        Ok(())
    }

    fn namespaces(&self) -> StorageResult<Vec<String>> {
        Ok(self.blobs.read().keys().cloned().collect())
    }
}
