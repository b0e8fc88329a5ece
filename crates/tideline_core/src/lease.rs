//! Storage-held lease serializing sync passes across clients.

use crate::codec::update_document;
use crate::error::CoreResult;
use crate::types::{now_millis, ClientId, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tideline_storage::StorageBackend;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LeaseRecord {
    holder: Option<ClientId>,
    expires_at: Timestamp,
}

/// An expiring claim on the right to replay a shared queue.
///
/// Every client replaying the same queue holds its own `PassLease` with a
/// distinct owner. At most one owner holds the lease at a time; a holder
/// that stops renewing loses it once `ttl` has elapsed.
pub struct PassLease {
    storage: Arc<dyn StorageBackend>,
    namespace: String,
    owner: ClientId,
    ttl: Duration,
}

impl PassLease {
    /// Creates a lease handle with a fresh owner id.
    pub fn new(storage: Arc<dyn StorageBackend>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
            owner: ClientId::new(),
            ttl,
        }
    }

    /// Returns the owner id of this handle.
    pub fn owner(&self) -> ClientId {
        self.owner
    }

    /// Acquires the lease, or extends it if already held by this owner.
    ///
    /// Returns false if another owner holds an unexpired lease.
    ///
    /// # Errors
    ///
    /// Returns an error if the lease record cannot be durably updated.
    pub fn try_acquire(&self) -> CoreResult<bool> {
        let ttl = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        update_document(self.storage.as_ref(), &self.namespace, |lease: &mut LeaseRecord| {
            let now = now_millis();
            let held_elsewhere = lease
                .holder
                .is_some_and(|holder| holder != self.owner && lease.expires_at > now);
            if held_elsewhere {
                return Ok(false);
            }
            lease.holder = Some(self.owner);
            lease.expires_at = now.saturating_add(ttl);
            Ok(true)
        })
    }

    /// Gives the lease up if this owner holds it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lease record cannot be durably updated.
    pub fn release(&self) -> CoreResult<()> {
        update_document(self.storage.as_ref(), &self.namespace, |lease: &mut LeaseRecord| {
            if lease.holder == Some(self.owner) {
                lease.holder = None;
                lease.expires_at = 0;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tideline_storage::InMemoryBackend;

    fn pair(ttl: Duration) -> (PassLease, PassLease) {
        let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        (
            PassLease::new(Arc::clone(&storage), "sync_lease", ttl),
            PassLease::new(storage, "sync_lease", ttl),
        )
    }

    #[test]
    fn one_holder_at_a_time() {
        let (a, b) = pair(Duration::from_secs(60));
        assert_ne!(a.owner(), b.owner());

        assert!(a.try_acquire().unwrap());
        assert!(a.try_acquire().unwrap());
        assert!(!b.try_acquire().unwrap());

        a.release().unwrap();
        assert!(b.try_acquire().unwrap());
        assert!(!a.try_acquire().unwrap());
    }

    #[test]
    fn release_by_non_holder_is_noop() {
        let (a, b) = pair(Duration::from_secs(60));
        assert!(a.try_acquire().unwrap());
        b.release().unwrap();
        assert!(!b.try_acquire().unwrap());
    }

    #[test]
    fn expired_lease_can_be_taken() {
        let (a, b) = pair(Duration::ZERO);
        assert!(a.try_acquire().unwrap());
        std::thread::sleep(Duration::from_millis(2));
        assert!(b.try_acquire().unwrap());
    }
}
