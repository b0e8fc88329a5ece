//! Sync engine: replays the write queue against the remote store.

use crate::config::{DependencyPolicy, SyncConfig};
use crate::error::{RemoteError, RemoteResult, SyncError, SyncResult};
use crate::remote::RemoteStore;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tideline_core::{ClientId, Operation, PassLease, Payload, QueueItem, WriteQueue};
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass is running.
    Idle,
    /// A pass is replaying the queue.
    Syncing,
}

impl SyncState {
    /// Returns true if a pass is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }
}

/// Statistics about sync passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total number of passes completed.
    pub cycles_completed: u64,
    /// Passes dropped because another pass was in flight.
    pub cycles_coalesced: u64,
    /// Items applied remotely.
    pub items_succeeded: u64,
    /// Failed replay attempts.
    pub items_failed: u64,
    /// Items skipped while their INSERT was pending.
    pub items_deferred: u64,
    /// End of the last completed pass.
    pub last_sync_time: Option<Instant>,
    /// Last replay failure.
    pub last_error: Option<String>,
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Items applied and marked processed.
    pub succeeded: usize,
    /// Items that failed, remotely or while their INSERT was pending; they
    /// stay pending.
    pub failed: usize,
    /// Items skipped under [`DependencyPolicy::Defer`].
    pub deferred: usize,
    /// True if the call was dropped because a pass was already running.
    pub coalesced: bool,
    /// Wall time of the pass.
    pub duration: Duration,
}

impl SyncReport {
    /// Number of items tried during the pass.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Applies one mutation to the remote store, bounded by `timeout`.
///
/// `id` must already be resolved to the remote identity. Returns the id the
/// store assigned for an INSERT.
pub(crate) async fn apply_remote<R: RemoteStore + ?Sized>(
    remote: &R,
    timeout: Duration,
    operation: Operation,
    table: &str,
    id: Option<&str>,
    data: Option<&Payload>,
) -> RemoteResult<Option<String>> {
    let call = async {
        match (operation, id, data) {
            (Operation::Insert, _, Some(data)) => remote.create(table, data).await.map(Some),
            (Operation::Update, Some(id), Some(data)) => {
                remote.update(table, id, data).await.map(|()| None)
            }
            (Operation::Delete, Some(id), _) => remote.delete(table, id).await.map(|()| None),
            _ => Err(RemoteError::store(format!(
                "{operation} on {table} is missing its record id or data"
            ))),
        }
    };
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(RemoteError::Timeout))
}

/// Replays pending mutations against a [`RemoteStore`].
///
/// Each pass walks the pending items in enqueue order, applies each one
/// remotely, and marks it processed or records the failure for the next
/// pass. Delivery is at-least-once per item until it succeeds.
///
/// Only one pass runs at a time over a queue: a [`SyncEngine::sync_once`]
/// call made while a pass is in flight, by this engine or by another engine
/// over the same storage, returns immediately with a coalesced report.
pub struct SyncEngine<R: RemoteStore> {
    config: SyncConfig,
    queue: Arc<WriteQueue>,
    remote: Arc<R>,
    pass_lock: tokio::sync::Mutex<()>,
    lease: PassLease,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<R: RemoteStore> SyncEngine<R> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, queue: Arc<WriteQueue>, remote: Arc<R>) -> Self {
        let lease = queue.pass_lease(config.lease_ttl);
        Self {
            config,
            queue,
            remote,
            pass_lock: tokio::sync::Mutex::new(()),
            lease,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the queue being replayed.
    pub fn queue(&self) -> &Arc<WriteQueue> {
        &self.queue
    }

    /// Gets the remote store.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Runs one pass over the pending items.
    ///
    /// Remote failures are absorbed per item. Items enqueued while the pass
    /// runs are picked up by the next pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue or mirror cannot be read or durably
    /// updated; the pass stops at that point.
    pub async fn sync_once(&self) -> SyncResult<SyncReport> {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            debug!("sync pass already running, coalescing");
            return Ok(self.coalesced());
        };
        if !self.lease.try_acquire()? {
            debug!("sync lease held by another client, coalescing");
            return Ok(self.coalesced());
        }

        let start = Instant::now();
        self.set_state(SyncState::Syncing);
        let result = self.run_pass().await;
        self.set_state(SyncState::Idle);

        let result = match result {
            Ok(report) if self.config.compact_after_pass => {
                self.queue.compact().map(|_| report).map_err(SyncError::from)
            }
            other => other,
        };
        if let Err(e) = self.lease.release() {
            warn!(error = %e, "cannot release sync lease");
        }

        let mut report = result?;
        report.duration = start.elapsed();

        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.items_succeeded += report.succeeded as u64;
            stats.items_failed += report.failed as u64;
            stats.items_deferred += report.deferred as u64;
            stats.last_sync_time = Some(Instant::now());
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            deferred = report.deferred,
            duration_ms = report.duration.as_millis() as u64,
            "sync pass complete"
        );
        Ok(report)
    }

    fn coalesced(&self) -> SyncReport {
        self.stats.write().cycles_coalesced += 1;
        SyncReport {
            coalesced: true,
            ..SyncReport::default()
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    async fn run_pass(&self) -> SyncResult<SyncReport> {
        let pending = self.queue.pending_items()?;
        let mut report = SyncReport::default();

        for item in pending {
            if !self.lease.try_acquire()? {
                warn!("sync lease lost, ending pass early");
                break;
            }

            if let Some(dependency) = self.pending_dependency(&item)? {
                match self.config.dependency_policy {
                    DependencyPolicy::Defer => {
                        debug!(
                            client_id = %item.client_id,
                            table = %item.table_name,
                            "deferred behind pending insert"
                        );
                        report.deferred += 1;
                    }
                    DependencyPolicy::Attempt => {
                        let error = format!("depends on unsynced insert {dependency}");
                        debug!(
                            client_id = %item.client_id,
                            table = %item.table_name,
                            %error,
                            "held behind pending insert"
                        );
                        self.queue.mark_failed(item.client_id, &error)?;
                        self.stats.write().last_error = Some(error);
                        report.failed += 1;
                    }
                }
                continue;
            }

            let target = item
                .record_id
                .as_deref()
                .map(|id| self.queue.resolve_record_id(id))
                .transpose()?;

            let outcome = apply_remote(
                self.remote.as_ref(),
                self.config.request_timeout,
                item.operation,
                &item.table_name,
                target.as_deref(),
                item.data.as_ref(),
            )
            .await;

            match outcome {
                Ok(remote_id) => {
                    self.on_success(&item, target.as_deref(), remote_id.as_deref())?;
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!(
                        client_id = %item.client_id,
                        operation = %item.operation,
                        table = %item.table_name,
                        error = %e,
                        "replay failed, will retry"
                    );
                    self.queue.mark_failed(item.client_id, &e.to_string())?;
                    self.stats.write().last_error = Some(e.to_string());
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Returns the INSERT an item targets if that INSERT has not landed.
    ///
    /// An INSERT that is gone from the queue or processed without a remote
    /// id never will, so it does not hold the item back.
    fn pending_dependency(&self, item: &QueueItem) -> SyncResult<Option<ClientId>> {
        let Some(dependency) = item.depends_on else {
            return Ok(None);
        };
        if self.queue.resolve_remote_id(dependency)?.is_some() {
            return Ok(None);
        }
        let waiting = self
            .queue
            .get(dependency)?
            .is_some_and(|insert| !insert.processed);
        Ok(waiting.then_some(dependency))
    }

    fn on_success(
        &self,
        item: &QueueItem,
        target: Option<&str>,
        remote_id: Option<&str>,
    ) -> SyncResult<()> {
        self.queue.mark_processed(item.client_id, remote_id)?;
        let mirror = self.queue.mirror();

        match (item.operation, remote_id, target) {
            (Operation::Insert, Some(remote_id), _) => {
                mirror.index_under(&item.table_name, &item.mirror_key(), remote_id)?;
            }
            (Operation::Delete, _, Some(target)) => {
                mirror.remove(&item.table_name, target)?;
            }
            _ => {}
        }

        debug!(
            client_id = %item.client_id,
            operation = %item.operation,
            table = %item.table_name,
            remote_id,
            "mutation replayed"
        );
        Ok(())
    }
}
