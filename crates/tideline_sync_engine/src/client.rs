//! Consumer-facing offline client.

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityProbe, ConnectivityState, Transition};
use crate::error::SyncResult;
use crate::remote::RemoteStore;
use crate::scheduler::{SchedulerHandle, SyncScheduler};
use crate::state::{apply_remote, SyncEngine, SyncReport};
use std::collections::BTreeMap;
use std::sync::Arc;
use tideline_core::{
    validate_mutation, ClientId, Config, MirrorStore, Operation, Payload, WriteQueue,
};
use tideline_storage::StorageBackend;
use tracing::{debug, warn};

/// How [`OfflineClient::write`] handled a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Applied remotely right away.
    Applied {
        /// Id assigned by the remote store for an INSERT.
        remote_id: Option<String>,
    },
    /// Queued for a later sync pass.
    Queued {
        /// Identifier of the queued item.
        client_id: ClientId,
    },
}

impl WriteOutcome {
    /// Returns true if the mutation was queued.
    pub fn is_queued(&self) -> bool {
        matches!(self, WriteOutcome::Queued { .. })
    }
}

/// The API domain consumers use to read and write while possibly offline.
///
/// Wires a [`WriteQueue`], a [`MirrorStore`], a [`ConnectivityMonitor`] and
/// a [`SyncEngine`] over one storage backend and one remote store.
pub struct OfflineClient<R: RemoteStore> {
    queue: Arc<WriteQueue>,
    mirror: Arc<MirrorStore>,
    monitor: Arc<ConnectivityMonitor>,
    engine: Arc<SyncEngine<R>>,
}

impl<R: RemoteStore> OfflineClient<R> {
    /// Creates a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted connectivity state cannot be read.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        remote: Arc<R>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> SyncResult<Self> {
        Self::with_config(storage, remote, probe, &Config::default(), SyncConfig::default())
    }

    /// Creates a client with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `sync_config` is invalid or persisted
    /// connectivity state cannot be read.
    pub fn with_config(
        storage: Arc<dyn StorageBackend>,
        remote: Arc<R>,
        probe: Arc<dyn ConnectivityProbe>,
        config: &Config,
        sync_config: SyncConfig,
    ) -> SyncResult<Self> {
        sync_config.validate()?;

        let mirror = Arc::new(MirrorStore::new(Arc::clone(&storage), config));
        let queue = Arc::new(WriteQueue::new(Arc::clone(&storage), Arc::clone(&mirror), config));
        let monitor = Arc::new(ConnectivityMonitor::new(
            storage,
            Arc::clone(&queue),
            probe,
            config,
        )?);
        let engine = Arc::new(SyncEngine::new(sync_config, Arc::clone(&queue), remote));

        Ok(Self {
            queue,
            mirror,
            monitor,
            engine,
        })
    }

    /// Queues a mutation without contacting the remote store.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed mutation or a storage failure.
    pub fn enqueue(
        &self,
        operation: Operation,
        table: &str,
        record_id: Option<&str>,
        data: Option<Payload>,
    ) -> SyncResult<ClientId> {
        Ok(self.queue.enqueue(operation, table, record_id, data)?)
    }

    /// Writes through to the remote store, falling back to the queue.
    ///
    /// The remote call is made only when the client is online and nothing
    /// is pending; otherwise, and whenever the call fails, the mutation is
    /// queued. Remote failures are never returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed mutation or a local storage failure.
    pub async fn write(
        &self,
        operation: Operation,
        table: &str,
        record_id: Option<&str>,
        data: Option<Payload>,
    ) -> SyncResult<WriteOutcome> {
        validate_mutation(operation, table, record_id, data.as_ref())?;

        let status = self.monitor.current_status();
        if status.is_offline || status.is_pending_sync {
            return self.queue_write(operation, table, record_id, data);
        }

        let target = record_id
            .map(|id| self.queue.resolve_record_id(id))
            .transpose()?;
        let result = apply_remote(
            self.engine.remote().as_ref(),
            self.engine.config().request_timeout,
            operation,
            table,
            target.as_deref(),
            data.as_ref(),
        )
        .await;

        match result {
            Ok(remote_id) => {
                self.mirror_applied(
                    operation,
                    table,
                    record_id,
                    target.as_deref(),
                    remote_id.as_deref(),
                    data,
                )?;
                debug!(%operation, table, "write applied remotely");
                Ok(WriteOutcome::Applied { remote_id })
            }
            Err(e) => {
                warn!(%operation, table, error = %e, "remote write failed, queuing");
                self.queue_write(operation, table, record_id, data)
            }
        }
    }

    /// Runs one sync pass.
    ///
    /// # Errors
    ///
    /// Returns an error on local storage failure.
    pub async fn sync_once(&self) -> SyncResult<SyncReport> {
        self.engine.sync_once().await
    }

    /// Returns the number of unprocessed queue items.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.queue.pending_count()?)
    }

    /// Returns the last known value of a record.
    pub fn mirror_get(&self, table: &str, key: &str) -> Option<Payload> {
        self.mirror.get(table, key)
    }

    /// Returns every mirrored record of a table.
    pub fn mirror_entries(&self, table: &str) -> BTreeMap<String, Payload> {
        self.mirror.entries(table)
    }

    /// Stores the result of a successful remote read in the mirror.
    ///
    /// # Errors
    ///
    /// Returns an error if the mirror cannot be durably updated.
    pub fn record_remote_read(&self, table: &str, key: &str, data: Payload) -> SyncResult<()> {
        Ok(self.mirror.put(table, key, data)?)
    }

    /// Returns connectivity and queue health.
    pub fn status(&self) -> ConnectivityState {
        self.monitor.current_status()
    }

    /// Reports a connectivity change from the host.
    pub fn set_online(&self, online: bool) -> Transition {
        self.monitor.set_online(online)
    }

    /// Returns the write queue.
    pub fn queue(&self) -> &Arc<WriteQueue> {
        &self.queue
    }

    /// Returns the connectivity monitor.
    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    /// Returns the sync engine.
    pub fn engine(&self) -> &Arc<SyncEngine<R>> {
        &self.engine
    }

    fn queue_write(
        &self,
        operation: Operation,
        table: &str,
        record_id: Option<&str>,
        data: Option<Payload>,
    ) -> SyncResult<WriteOutcome> {
        let client_id = self.queue.enqueue(operation, table, record_id, data)?;
        Ok(WriteOutcome::Queued { client_id })
    }

    fn mirror_applied(
        &self,
        operation: Operation,
        table: &str,
        record_id: Option<&str>,
        target: Option<&str>,
        remote_id: Option<&str>,
        data: Option<Payload>,
    ) -> SyncResult<()> {
        let keys: Vec<&str> = match operation {
            Operation::Insert => remote_id.into_iter().chain(record_id).collect(),
            Operation::Update | Operation::Delete => {
                let mut keys: Vec<&str> = record_id.into_iter().chain(target).collect();
                keys.dedup();
                keys
            }
        };

        for key in keys {
            match (&data, operation) {
                (_, Operation::Delete) => self.mirror.remove(table, key)?,
                (Some(data), _) => self.mirror.put(table, key, data.clone())?,
                (None, _) => {}
            }
        }
        Ok(())
    }
}

impl<R: RemoteStore + 'static> OfflineClient<R> {
    /// Starts a background scheduler for this client.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_scheduler(&self) -> SchedulerHandle {
        SyncScheduler::spawn(
            Arc::clone(&self.engine),
            Arc::clone(&self.monitor),
            self.engine.config().poll_interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ManualProbe;
    use crate::remote::MockRemoteStore;
    use tideline_storage::InMemoryBackend;

    fn client(online: bool) -> (OfflineClient<MockRemoteStore>, Arc<MockRemoteStore>) {
        let remote = Arc::new(MockRemoteStore::new().with_next_id(100));
        let client = OfflineClient::new(
            Arc::new(InMemoryBackend::new()),
            Arc::clone(&remote),
            Arc::new(ManualProbe::new(online)),
        )
        .unwrap();
        (client, remote)
    }

    fn body(value: &str) -> Payload {
        Payload::encode(&value).unwrap()
    }

    #[tokio::test]
    async fn online_write_applies_directly() {
        let (client, remote) = client(true);

        let outcome = client
            .write(Operation::Insert, "modules", None, Some(body("m")))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WriteOutcome::Applied {
                remote_id: Some("100".into())
            }
        );
        assert_eq!(client.pending_count().unwrap(), 0);
        assert_eq!(client.mirror_get("modules", "100"), Some(body("m")));
        assert_eq!(remote.record_count("modules"), 1);
    }

    #[tokio::test]
    async fn offline_write_is_queued() {
        let (client, remote) = client(false);

        let outcome = client
            .write(Operation::Update, "settings", Some("theme"), Some(body("dark")))
            .await
            .unwrap();

        assert!(outcome.is_queued());
        assert_eq!(client.pending_count().unwrap(), 1);
        assert_eq!(client.mirror_get("settings", "theme"), Some(body("dark")));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_write_falls_back_to_queue() {
        let (client, remote) = client(true);
        remote.set_connected(false);

        let outcome = client
            .write(Operation::Delete, "users", Some("7"), None)
            .await
            .unwrap();

        assert!(outcome.is_queued());
        assert_eq!(client.pending_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn writes_queue_behind_pending_items() {
        let (client, remote) = client(true);
        remote.seed("settings", "theme", body("light"));
        client
            .enqueue(Operation::Update, "settings", Some("theme"), Some(body("dark")))
            .unwrap();

        let outcome = client
            .write(Operation::Update, "settings", Some("theme"), Some(body("blue")))
            .await
            .unwrap();
        assert!(outcome.is_queued());

        client.sync_once().await.unwrap();
        assert_eq!(remote.record("settings", "theme"), Some(body("blue")));
    }

    #[tokio::test]
    async fn malformed_write_is_rejected() {
        let (client, remote) = client(true);
        let result = client.write(Operation::Update, "users", None, None).await;
        assert!(result.is_err());
        assert!(remote.calls().is_empty());
        assert_eq!(client.pending_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn online_delete_clears_mirror() {
        let (client, remote) = client(true);
        remote.seed("users", "5", body("u"));
        client.record_remote_read("users", "5", body("u")).unwrap();

        client
            .write(Operation::Delete, "users", Some("5"), None)
            .await
            .unwrap();

        assert_eq!(client.mirror_get("users", "5"), None);
        assert_eq!(remote.record("users", "5"), None);
    }

    #[test]
    fn record_remote_read_refreshes_mirror() {
        let (client, _) = client(false);
        client.record_remote_read("modules", "a", body("1")).unwrap();
        client.record_remote_read("modules", "b", body("2")).unwrap();

        assert_eq!(client.mirror_entries("modules").len(), 2);
        assert!(client.status().is_offline);
    }

    #[test]
    fn invalid_sync_config_rejected() {
        let result = OfflineClient::with_config(
            Arc::new(InMemoryBackend::new()),
            Arc::new(MockRemoteStore::new()),
            Arc::new(ManualProbe::new(true)),
            &Config::default(),
            SyncConfig::new().with_request_timeout(std::time::Duration::ZERO),
        );
        assert!(result.is_err());
    }
}
