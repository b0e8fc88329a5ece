//! Durable write queue of pending mutations.

use crate::codec::{load_document, update_document};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::lease::PassLease;
use crate::mirror::MirrorStore;
use crate::payload::Payload;
use crate::types::{now_millis, ClientId, Operation, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tideline_storage::StorageBackend;
use tracing::debug;

/// One durable mutation intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Identifier assigned at enqueue time.
    pub client_id: ClientId,
    /// Position in enqueue order.
    pub seq: u64,
    /// The mutation kind.
    pub operation: Operation,
    /// Logical resource partition.
    pub table_name: String,
    /// Target record for UPDATE/DELETE.
    pub record_id: Option<String>,
    /// Payload for INSERT/UPDATE.
    pub data: Option<Payload>,
    /// Enqueue time; non-decreasing in `seq` order.
    pub created_at: Timestamp,
    /// Set once the mutation was applied remotely.
    pub processed: bool,
    /// Last replay failure, kept for diagnostics.
    pub error: Option<String>,
    /// Number of replay attempts so far.
    pub attempts: u32,
    /// INSERT whose locally generated key this item targets.
    pub depends_on: Option<ClientId>,
}

impl QueueItem {
    /// Returns the mirror key of the record this item touches.
    ///
    /// That is the record id, or the client id for an INSERT without one.
    #[must_use]
    pub fn mirror_key(&self) -> String {
        self.record_id
            .clone()
            .unwrap_or_else(|| self.client_id.to_string())
    }
}

/// The persisted queue document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueLog {
    next_seq: u64,
    items: Vec<QueueItem>,
    /// Remote identities of synced INSERTs, by client id. Never pruned:
    /// callers may address a record by its client id at any later time.
    remote_ids: BTreeMap<ClientId, String>,
}

impl QueueLog {
    fn find_mut(&mut self, client_id: ClientId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|i| i.client_id == client_id)
    }

    /// Finds the INSERT in `table` whose client id equals `record_id`.
    fn insert_dependency(&self, table: &str, record_id: &str) -> Option<ClientId> {
        let candidate = ClientId::parse(record_id)?;
        if self.remote_ids.contains_key(&candidate) {
            return Some(candidate);
        }
        self.items
            .iter()
            .find(|i| {
                i.client_id == candidate
                    && i.operation == Operation::Insert
                    && i.table_name == table
            })
            .map(|i| i.client_id)
    }
}

/// Queue counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items not yet processed.
    pub pending: usize,
    /// Processed items awaiting compaction.
    pub processed: usize,
    /// Pending items carrying an error.
    pub failing: usize,
    /// Recorded client id to remote id mappings.
    pub remote_ids: usize,
}

/// An ordered, durable log of pending mutations.
///
/// Every mutation of the log is a single atomic read-modify-write against
/// storage, so several `WriteQueue`s over the same storage (other sessions,
/// other processes) never lose each other's updates.
///
/// # Invariants
///
/// - Items are replayed in ascending `seq`
/// - Processed items are never returned by [`WriteQueue::pending_items`]
/// - Items are only removed by [`WriteQueue::compact`], and only once processed
pub struct WriteQueue {
    storage: Arc<dyn StorageBackend>,
    mirror: Arc<MirrorStore>,
    namespace: String,
    lease_namespace: String,
}

impl WriteQueue {
    /// Creates a queue over `storage`, writing through to `mirror`.
    pub fn new(storage: Arc<dyn StorageBackend>, mirror: Arc<MirrorStore>, config: &Config) -> Self {
        Self {
            storage,
            mirror,
            namespace: config.queue_namespace.clone(),
            lease_namespace: config.lease_namespace.clone(),
        }
    }

    /// Returns the mirror this queue writes through to.
    pub fn mirror(&self) -> &Arc<MirrorStore> {
        &self.mirror
    }

    /// Records a mutation intent and updates the mirror.
    ///
    /// INSERT and UPDATE write `data` to the mirror under the record id (or
    /// the new client id for an INSERT without one); DELETE removes the
    /// mirror entry. The item is appended only after the mirror was updated,
    /// so an error means nothing was queued.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidMutation` if the mutation is malformed
    /// - `CoreError::Storage` / `CoreError::Codec` if the mirror or the
    ///   queue cannot be durably updated
    pub fn enqueue(
        &self,
        operation: Operation,
        table_name: &str,
        record_id: Option<&str>,
        data: Option<Payload>,
    ) -> CoreResult<ClientId> {
        validate_mutation(operation, table_name, record_id, data.as_ref())?;

        let client_id = ClientId::new();
        let key = record_id.map_or_else(|| client_id.to_string(), str::to_string);
        let alias = match record_id {
            Some(id) => {
                let log = self.load()?;
                log.insert_dependency(table_name, id)
                    .and_then(|dep| log.remote_ids.get(&dep).cloned())
            }
            None => None,
        };

        // The mirror goes first: a failed enqueue must leave nothing queued.
        match operation {
            Operation::Insert | Operation::Update => {
                if let Some(data) = &data {
                    self.mirror.put(table_name, &key, data.clone())?;
                    if let Some(remote_id) = &alias {
                        self.mirror.put(table_name, remote_id, data.clone())?;
                    }
                }
            }
            Operation::Delete => {
                self.mirror.remove(table_name, &key)?;
                if let Some(remote_id) = &alias {
                    self.mirror.remove(table_name, remote_id)?;
                }
            }
        }

        update_document(self.storage.as_ref(), &self.namespace, |log: &mut QueueLog| {
            let depends_on = record_id.and_then(|id| log.insert_dependency(table_name, id));
            let created_at = log
                .items
                .last()
                .map_or(now_millis(), |last| last.created_at.max(now_millis()));

            log.items.push(QueueItem {
                client_id,
                seq: log.next_seq,
                operation,
                table_name: table_name.to_string(),
                record_id: record_id.map(str::to_string),
                data: data.clone(),
                created_at,
                processed: false,
                error: None,
                attempts: 0,
                depends_on,
            });
            log.next_seq += 1;
            Ok(())
        })?;

        debug!(%client_id, %operation, table = table_name, "mutation queued");
        Ok(client_id)
    }

    /// Creates a lease handle for replaying this queue.
    ///
    /// Handles created from queues over the same storage contend for the
    /// same lease.
    pub fn pass_lease(&self, ttl: Duration) -> PassLease {
        PassLease::new(Arc::clone(&self.storage), self.lease_namespace.clone(), ttl)
    }

    /// Returns all unprocessed items in replay order.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn pending_items(&self) -> CoreResult<Vec<QueueItem>> {
        let mut pending: Vec<QueueItem> = self
            .load()?
            .items
            .into_iter()
            .filter(|i| !i.processed)
            .collect();
        pending.sort_by_key(|i| i.seq);
        Ok(pending)
    }

    /// Returns the number of unprocessed items.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn pending_count(&self) -> CoreResult<usize> {
        Ok(self.load()?.items.iter().filter(|i| !i.processed).count())
    }

    /// Returns every item still in the log, processed or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn items(&self) -> CoreResult<Vec<QueueItem>> {
        Ok(self.load()?.items)
    }

    /// Returns one item by client id.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn get(&self, client_id: ClientId) -> CoreResult<Option<QueueItem>> {
        Ok(self
            .load()?
            .items
            .into_iter()
            .find(|i| i.client_id == client_id))
    }

    /// Returns the total number of items in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.load()?.items.len())
    }

    /// Returns true if the log holds no items.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.load()?.items.is_empty())
    }

    /// Returns queue counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn stats(&self) -> CoreResult<QueueStats> {
        let log = self.load()?;
        let mut stats = QueueStats {
            remote_ids: log.remote_ids.len(),
            ..QueueStats::default()
        };
        for item in &log.items {
            if item.processed {
                stats.processed += 1;
            } else {
                stats.pending += 1;
                if item.error.is_some() {
                    stats.failing += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Returns the remote identity recorded for a synced INSERT.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn resolve_remote_id(&self, client_id: ClientId) -> CoreResult<Option<String>> {
        Ok(self.load()?.remote_ids.get(&client_id).cloned())
    }

    /// Maps a record id through the identity map.
    ///
    /// Returns the remote id if `record_id` is the client id of a synced
    /// INSERT, otherwise `record_id` unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn resolve_record_id(&self, record_id: &str) -> CoreResult<String> {
        let resolved = ClientId::parse(record_id)
            .map(|id| self.resolve_remote_id(id))
            .transpose()?
            .flatten();
        Ok(resolved.unwrap_or_else(|| record_id.to_string()))
    }

    /// Marks an item as applied.
    ///
    /// For an INSERT, `remote_id` is recorded in the identity map. Returns
    /// false if the item is unknown or was already processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be durably updated.
    pub fn mark_processed(&self, client_id: ClientId, remote_id: Option<&str>) -> CoreResult<bool> {
        update_document(self.storage.as_ref(), &self.namespace, |log: &mut QueueLog| {
            let Some(item) = log.find_mut(client_id) else {
                return Ok(false);
            };
            if item.processed {
                return Ok(false);
            }
            item.processed = true;
            item.error = None;
            item.attempts = item.attempts.saturating_add(1);
            let is_insert = item.operation == Operation::Insert;

            if let (true, Some(remote_id)) = (is_insert, remote_id) {
                log.remote_ids.insert(client_id, remote_id.to_string());
            }
            Ok(true)
        })
    }

    /// Records a failed replay attempt.
    ///
    /// The item stays pending. Returns false if the item is unknown or
    /// already processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be durably updated.
    pub fn mark_failed(&self, client_id: ClientId, error: &str) -> CoreResult<bool> {
        update_document(self.storage.as_ref(), &self.namespace, |log: &mut QueueLog| {
            match log.find_mut(client_id) {
                Some(item) if !item.processed => {
                    item.error = Some(error.to_string());
                    item.attempts = item.attempts.saturating_add(1);
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    /// Clears the recorded error of every pending item.
    ///
    /// Returns the number of items cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be durably updated.
    pub fn clear_errors(&self) -> CoreResult<usize> {
        update_document(self.storage.as_ref(), &self.namespace, |log: &mut QueueLog| {
            let mut cleared = 0;
            for item in log.items.iter_mut().filter(|i| !i.processed) {
                if item.error.take().is_some() {
                    cleared += 1;
                }
            }
            Ok(cleared)
        })
    }

    /// Permanently removes processed items.
    ///
    /// Returns the number removed. Items enqueued concurrently are kept.
    /// The identity map is kept too, so client ids of synced INSERTs keep
    /// resolving after their items are gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be durably updated.
    pub fn compact(&self) -> CoreResult<usize> {
        let removed = update_document(self.storage.as_ref(), &self.namespace, |log: &mut QueueLog| {
            let before = log.items.len();
            log.items.retain(|i| !i.processed);
            Ok(before - log.items.len())
        })?;
        if removed > 0 {
            debug!(removed, "queue compacted");
        }
        Ok(removed)
    }

    fn load(&self) -> CoreResult<QueueLog> {
        load_document(self.storage.as_ref(), &self.namespace)
    }
}

/// Checks that a mutation is well formed.
///
/// # Errors
///
/// Returns `CoreError::InvalidMutation` if the table name is empty, an
/// UPDATE or DELETE lacks a record id, an INSERT or UPDATE lacks data, or
/// a record id is empty.
pub fn validate_mutation(
    operation: Operation,
    table_name: &str,
    record_id: Option<&str>,
    data: Option<&Payload>,
) -> CoreResult<()> {
    if table_name.is_empty() {
        return Err(CoreError::invalid_mutation("table name must not be empty"));
    }
    if operation.requires_record_id() && record_id.map_or(true, str::is_empty) {
        return Err(CoreError::invalid_mutation(format!(
            "{operation} on {table_name} requires a record id"
        )));
    }
    if record_id == Some("") {
        return Err(CoreError::invalid_mutation("record id must not be empty"));
    }
    if operation.requires_data() && data.is_none() {
        return Err(CoreError::invalid_mutation(format!(
            "{operation} on {table_name} requires data"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};
    use tideline_storage::{FileBackend, InMemoryBackend};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Setting {
        value: String,
    }

    fn setting(value: &str) -> Payload {
        Payload::encode(&Setting {
            value: value.into(),
        })
        .unwrap()
    }

    fn queue_over(storage: Arc<dyn StorageBackend>) -> WriteQueue {
        let config = Config::default();
        let mirror = Arc::new(MirrorStore::new(Arc::clone(&storage), &config));
        WriteQueue::new(storage, mirror, &config)
    }

    fn new_queue() -> WriteQueue {
        queue_over(Arc::new(InMemoryBackend::new()))
    }

    #[test]
    fn enqueue_appends_pending_item() {
        let queue = new_queue();
        let id = queue
            .enqueue(Operation::Update, "settings", Some("theme"), Some(setting("dark")))
            .unwrap();

        let pending = queue.pending_items().unwrap();
        assert_eq!(pending.len(), 1);
        let item = &pending[0];
        assert_eq!(item.client_id, id);
        assert_eq!(item.operation, Operation::Update);
        assert_eq!(item.table_name, "settings");
        assert_eq!(item.record_id.as_deref(), Some("theme"));
        assert!(!item.processed);
        assert_eq!(item.error, None);
        assert_eq!(item.depends_on, None);
    }

    #[test]
    fn enqueue_updates_mirror_before_sync() {
        let queue = new_queue();
        queue
            .enqueue(Operation::Update, "settings", Some("theme"), Some(setting("dark")))
            .unwrap();

        let stored = queue.mirror().get("settings", "theme").unwrap();
        assert_eq!(stored.decode::<Setting>().unwrap().value, "dark");
    }

    #[test]
    fn insert_is_mirrored_under_client_id() {
        let queue = new_queue();
        let id = queue
            .enqueue(Operation::Insert, "users", None, Some(setting("a")))
            .unwrap();

        assert!(queue.mirror().get("users", &id.to_string()).is_some());
    }

    #[test]
    fn delete_removes_mirror_entry() {
        let queue = new_queue();
        queue
            .enqueue(Operation::Update, "settings", Some("theme"), Some(setting("dark")))
            .unwrap();
        queue
            .enqueue(Operation::Delete, "settings", Some("theme"), None)
            .unwrap();

        assert_eq!(queue.mirror().get("settings", "theme"), None);
        assert_eq!(queue.pending_count().unwrap(), 2);
    }

    #[test]
    fn malformed_mutations_rejected() {
        let queue = new_queue();

        let cases = [
            queue.enqueue(Operation::Delete, "users", None, None),
            queue.enqueue(Operation::Update, "users", None, Some(setting("x"))),
            queue.enqueue(Operation::Update, "users", Some("1"), None),
            queue.enqueue(Operation::Insert, "users", None, None),
            queue.enqueue(Operation::Insert, "", None, Some(setting("x"))),
            queue.enqueue(Operation::Delete, "users", Some(""), None),
        ];
        for result in cases {
            assert!(matches!(result, Err(CoreError::InvalidMutation { .. })));
        }
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn pending_items_in_enqueue_order() {
        let queue = new_queue();
        let ids: Vec<_> = (0..5)
            .map(|i| {
                queue
                    .enqueue(Operation::Update, "t", Some(&i.to_string()), Some(setting("v")))
                    .unwrap()
            })
            .collect();

        let pending = queue.pending_items().unwrap();
        let order: Vec<_> = pending.iter().map(|i| i.client_id).collect();
        assert_eq!(order, ids);
        assert!(pending.windows(2).all(|w| w[0].seq < w[1].seq));
        assert!(pending.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn mark_failed_keeps_item_pending() {
        let queue = new_queue();
        let id = queue
            .enqueue(Operation::Delete, "users", Some("7"), None)
            .unwrap();

        assert!(queue.mark_failed(id, "connection refused").unwrap());
        assert!(queue.mark_failed(id, "timeout").unwrap());

        let item = queue.get(id).unwrap().unwrap();
        assert!(!item.processed);
        assert_eq!(item.error.as_deref(), Some("timeout"));
        assert_eq!(item.attempts, 2);
        assert_eq!(queue.pending_count().unwrap(), 1);
        assert_eq!(queue.stats().unwrap().failing, 1);
    }

    #[test]
    fn mark_processed_is_idempotent() {
        let queue = new_queue();
        let id = queue
            .enqueue(Operation::Delete, "users", Some("7"), None)
            .unwrap();
        queue.mark_failed(id, "offline").unwrap();

        assert!(queue.mark_processed(id, None).unwrap());
        assert!(!queue.mark_processed(id, None).unwrap());
        assert!(!queue.mark_failed(id, "late failure").unwrap());

        let item = queue.get(id).unwrap().unwrap();
        assert!(item.processed);
        assert_eq!(item.error, None);
        assert_eq!(queue.pending_count().unwrap(), 0);
        assert!(queue.pending_items().unwrap().is_empty());
    }

    #[test]
    fn unknown_client_id_is_noop() {
        let queue = new_queue();
        assert!(!queue.mark_processed(ClientId::new(), Some("1")).unwrap());
        assert!(!queue.mark_failed(ClientId::new(), "x").unwrap());
    }

    #[test]
    fn compact_removes_only_processed() {
        let queue = new_queue();
        let a = queue.enqueue(Operation::Delete, "t", Some("1"), None).unwrap();
        let b = queue.enqueue(Operation::Delete, "t", Some("2"), None).unwrap();
        queue.mark_processed(a, None).unwrap();

        assert_eq!(queue.compact().unwrap(), 1);
        assert_eq!(queue.compact().unwrap(), 0);

        let items = queue.items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].client_id, b);
    }

    #[test]
    fn insert_remote_id_recorded_and_resolved() {
        let queue = new_queue();
        let id = queue
            .enqueue(Operation::Insert, "users", None, Some(setting("a")))
            .unwrap();
        queue.mark_processed(id, Some("42")).unwrap();
        queue.compact().unwrap();

        assert_eq!(queue.resolve_remote_id(id).unwrap().as_deref(), Some("42"));
        assert_eq!(queue.resolve_record_id(&id.to_string()).unwrap(), "42");
        assert_eq!(queue.resolve_record_id("theme").unwrap(), "theme");
        assert_eq!(queue.stats().unwrap().remote_ids, 1);
    }

    #[test]
    fn failed_mirror_write_queues_nothing() {
        let storage = Arc::new(InMemoryBackend::new());
        let queue = queue_over(storage.clone());
        storage.write("local_users", &[0xff, 0xfe, 0x00]).unwrap();

        let result = queue.enqueue(Operation::Insert, "users", None, Some(setting("a")));
        assert!(result.is_err());
        assert_eq!(queue.pending_count().unwrap(), 0);
        assert!(queue.is_empty().unwrap());

        // Other tables are unaffected.
        queue
            .enqueue(Operation::Update, "settings", Some("theme"), Some(setting("dark")))
            .unwrap();
        assert_eq!(queue.pending_count().unwrap(), 1);
    }

    #[test]
    fn pass_leases_contend_over_shared_storage() {
        let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        let first = queue_over(Arc::clone(&storage)).pass_lease(Duration::from_secs(60));
        let second = queue_over(storage).pass_lease(Duration::from_secs(60));

        assert!(first.try_acquire().unwrap());
        assert!(!second.try_acquire().unwrap());
        first.release().unwrap();
        assert!(second.try_acquire().unwrap());
    }

    #[test]
    fn dependent_items_are_tagged() {
        let queue = new_queue();
        let insert = queue
            .enqueue(Operation::Insert, "users", None, Some(setting("a")))
            .unwrap();
        let key = insert.to_string();
        let update = queue
            .enqueue(Operation::Update, "users", Some(&key), Some(setting("b")))
            .unwrap();
        let other_table = queue
            .enqueue(Operation::Update, "modules", Some(&key), Some(setting("c")))
            .unwrap();

        assert_eq!(queue.get(update).unwrap().unwrap().depends_on, Some(insert));
        assert_eq!(queue.get(other_table).unwrap().unwrap().depends_on, None);
        // The later UPDATE overwrote the locally keyed mirror record.
        let mirrored = queue.mirror().get("users", &key).unwrap();
        assert_eq!(mirrored.decode::<Setting>().unwrap().value, "b");
    }

    #[test]
    fn update_after_synced_insert_mirrors_remote_key() {
        let queue = new_queue();
        let insert = queue
            .enqueue(Operation::Insert, "users", None, Some(setting("a")))
            .unwrap();
        queue.mark_processed(insert, Some("42")).unwrap();

        queue
            .enqueue(Operation::Update, "users", Some(&insert.to_string()), Some(setting("b")))
            .unwrap();

        let by_remote = queue.mirror().get("users", "42").unwrap();
        assert_eq!(by_remote.decode::<Setting>().unwrap().value, "b");
    }

    #[test]
    fn clear_errors_resets_pending_only() {
        let queue = new_queue();
        let a = queue.enqueue(Operation::Delete, "t", Some("1"), None).unwrap();
        let b = queue.enqueue(Operation::Delete, "t", Some("2"), None).unwrap();
        queue.mark_failed(a, "x").unwrap();
        queue.mark_failed(b, "y").unwrap();
        queue.mark_processed(b, None).unwrap();

        assert_eq!(queue.clear_errors().unwrap(), 1);
        assert_eq!(queue.get(a).unwrap().unwrap().error, None);
    }

    #[test]
    fn two_queues_share_storage() {
        let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        let first = queue_over(Arc::clone(&storage));
        let second = queue_over(Arc::clone(&storage));

        first.enqueue(Operation::Delete, "t", Some("1"), None).unwrap();
        second.enqueue(Operation::Delete, "t", Some("2"), None).unwrap();
        first.enqueue(Operation::Delete, "t", Some("3"), None).unwrap();

        assert_eq!(first.pending_count().unwrap(), 3);
        let seqs: Vec<_> = second.pending_items().unwrap().iter().map(|i| i.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let queue = queue_over(Arc::new(FileBackend::open(dir.path()).unwrap()));
            queue
                .enqueue(Operation::Update, "settings", Some("theme"), Some(setting("dark")))
                .unwrap()
        };

        let queue = queue_over(Arc::new(FileBackend::open(dir.path()).unwrap()));
        let pending = queue.pending_items().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].client_id, id);
        let data = pending[0].data.as_ref().unwrap();
        assert_eq!(data.decode::<Setting>().unwrap().value, "dark");
    }

    proptest! {
        #[test]
        fn pending_count_tracks_unprocessed(
            ops in proptest::collection::vec((0u8..3, any::<bool>()), 0..24)
        ) {
            let queue = new_queue();
            let mut expected = 0usize;

            for (i, (kind, processed)) in ops.into_iter().enumerate() {
                let key = i.to_string();
                let id = match kind {
                    0 => queue.enqueue(Operation::Insert, "t", None, Some(setting("v"))),
                    1 => queue.enqueue(Operation::Update, "t", Some(&key), Some(setting("v"))),
                    _ => queue.enqueue(Operation::Delete, "t", Some(&key), None),
                }
                .unwrap();
                expected += 1;

                if processed {
                    queue.mark_processed(id, None).unwrap();
                    expected -= 1;
                }
                prop_assert_eq!(queue.pending_count().unwrap(), expected);
            }

            queue.compact().unwrap();
            prop_assert_eq!(queue.pending_count().unwrap(), expected);
            prop_assert_eq!(queue.len().unwrap(), expected);
        }
    }
}
