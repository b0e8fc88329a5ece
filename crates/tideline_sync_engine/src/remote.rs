//! Remote store abstraction.

use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tideline_core::{Operation, Payload};

/// The backing store that queued mutations are replayed against.
///
/// This trait abstracts the network and the store's schema: records are
/// opaque payloads addressed by table name and record id. Implementations
/// wrap whatever transport the host uses (HTTP, a database driver, ...).
/// Every failure is reported as a [`RemoteError`] and treated as retryable.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Creates a record and returns the identifier the store assigned.
    async fn create(&self, table: &str, data: &Payload) -> RemoteResult<String>;

    /// Partially updates the record addressed by `id`.
    async fn update(&self, table: &str, id: &str, data: &Payload) -> RemoteResult<()>;

    /// Removes the record addressed by `id`.
    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()>;
}

/// A remote call observed by [`MockRemoteStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    /// The kind of call.
    pub operation: Operation,
    /// Target table.
    pub table: String,
    /// Target record: the addressed id, or the assigned id for a create.
    pub id: Option<String>,
    /// Whether the call succeeded.
    pub succeeded: bool,
}

/// An in-memory remote store for testing.
///
/// Assigns sequential numeric ids, records every call, and can be switched
/// offline, slowed down, or told to reject upcoming calls.
#[derive(Debug)]
pub struct MockRemoteStore {
    tables: Mutex<BTreeMap<String, BTreeMap<String, Payload>>>,
    calls: Mutex<Vec<RemoteCall>>,
    injected: Mutex<VecDeque<RemoteError>>,
    next_id: AtomicU64,
    connected: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MockRemoteStore {
    /// Creates an empty, connected store whose first assigned id is 1.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            injected: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            latency: Mutex::new(None),
        }
    }

    /// Sets the next id the store will assign.
    pub fn with_next_id(self, id: u64) -> Self {
        self.next_id.store(id, Ordering::SeqCst);
        self
    }

    /// Stores a record as if it had been created earlier.
    pub fn seed(&self, table: &str, id: &str, data: Payload) {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), data);
    }

    /// Sets the connected state. Calls fail with a transport error while
    /// disconnected.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes the next `count` calls fail with `error`.
    pub fn fail_next(&self, count: usize, error: RemoteError) {
        let mut injected = self.injected.lock();
        for _ in 0..count {
            injected.push_back(error.clone());
        }
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Returns a stored record.
    pub fn record(&self, table: &str, id: &str) -> Option<Payload> {
        self.tables.lock().get(table)?.get(id).cloned()
    }

    /// Returns the number of records in a table.
    pub fn record_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, BTreeMap::len)
    }

    /// Returns every call observed so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Returns the successful calls, in the order they took effect.
    pub fn applied(&self) -> Vec<RemoteCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.succeeded)
            .cloned()
            .collect()
    }

    async fn begin(&self) -> RemoteResult<()> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RemoteError::transport("network unreachable"));
        }
        match self.injected.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn observe<T>(
        &self,
        operation: Operation,
        table: &str,
        id: Option<String>,
        result: RemoteResult<T>,
    ) -> RemoteResult<T> {
        self.calls.lock().push(RemoteCall {
            operation,
            table: table.to_string(),
            id,
            succeeded: result.is_ok(),
        });
        result
    }
}

impl Default for MockRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn create(&self, table: &str, data: &Payload) -> RemoteResult<String> {
        let result = match self.begin().await {
            Ok(()) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
                self.seed(table, &id, data.clone());
                Ok(id)
            }
            Err(e) => Err(e),
        };
        let id = result.as_ref().ok().cloned();
        self.observe(Operation::Insert, table, id, result)
    }

    async fn update(&self, table: &str, id: &str, data: &Payload) -> RemoteResult<()> {
        let result = match self.begin().await {
            Ok(()) => {
                let mut tables = self.tables.lock();
                match tables.get_mut(table).and_then(|t| t.get_mut(id)) {
                    Some(record) => {
                        *record = data.clone();
                        Ok(())
                    }
                    None => Err(RemoteError::store(format!("no record {id} in {table}"))),
                }
            }
            Err(e) => Err(e),
        };
        self.observe(Operation::Update, table, Some(id.to_string()), result)
    }

    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()> {
        let result = match self.begin().await {
            Ok(()) => {
                if let Some(records) = self.tables.lock().get_mut(table) {
                    records.remove(id);
                }
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.observe(Operation::Delete, table, Some(id.to_string()), result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: &str) -> Payload {
        Payload::encode(&value).unwrap()
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let remote = MockRemoteStore::new().with_next_id(42);
        assert_eq!(remote.create("users", &body("a")).await.unwrap(), "42");
        assert_eq!(remote.create("users", &body("b")).await.unwrap(), "43");
        assert_eq!(remote.record("users", "42"), Some(body("a")));
        assert_eq!(remote.record_count("users"), 2);
    }

    #[tokio::test]
    async fn update_missing_record_fails() {
        let remote = MockRemoteStore::new();
        let result = remote.update("users", "9", &body("x")).await;
        assert!(matches!(result, Err(RemoteError::Store(_))));

        remote.seed("users", "9", body("old"));
        remote.update("users", "9", &body("new")).await.unwrap();
        assert_eq!(remote.record("users", "9"), Some(body("new")));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let remote = MockRemoteStore::new();
        remote.seed("users", "1", body("x"));
        remote.delete("users", "1").await.unwrap();
        remote.delete("users", "1").await.unwrap();
        assert_eq!(remote.record("users", "1"), None);
    }

    #[tokio::test]
    async fn disconnected_calls_fail() {
        let remote = MockRemoteStore::new();
        remote.set_connected(false);
        let result = remote.create("users", &body("a")).await;
        assert!(matches!(result, Err(RemoteError::Transport(_))));
        assert_eq!(remote.record_count("users"), 0);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let remote = MockRemoteStore::new();
        remote.fail_next(2, RemoteError::store("deadlock"));

        assert!(remote.delete("t", "1").await.is_err());
        assert!(remote.delete("t", "1").await.is_err());
        assert!(remote.delete("t", "1").await.is_ok());

        let calls = remote.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(remote.applied().len(), 1);
        assert!(!calls[0].succeeded);
    }
}
