//! Local mirror of records for offline reads.

use crate::codec::{load_document, update_document};
use crate::config::Config;
use crate::error::CoreResult;
use crate::payload::Payload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tideline_storage::StorageBackend;
use tracing::warn;

/// One table's mirrored records, by key.
#[derive(Debug, Default, Serialize, Deserialize)]
struct MirrorPartition {
    records: BTreeMap<String, Payload>,
}

/// A best-effort, table-partitioned cache of records.
///
/// Records are keyed by remote id, or by client id while a created record
/// has no remote identity yet. The mirror may be stale; absence means
/// "unknown locally", not "does not exist remotely".
///
/// Reads never fail: storage or decoding problems are logged and reported
/// as absence. Writes are atomic read-modify-writes of the table's
/// partition and report storage failures.
pub struct MirrorStore {
    storage: Arc<dyn StorageBackend>,
    config: Config,
}

impl MirrorStore {
    /// Creates a mirror over `storage`.
    pub fn new(storage: Arc<dyn StorageBackend>, config: &Config) -> Self {
        Self {
            storage,
            config: config.clone(),
        }
    }

    /// Returns the last known value of a record.
    pub fn get(&self, table: &str, key: &str) -> Option<Payload> {
        self.partition(table).and_then(|mut p| p.records.remove(key))
    }

    /// Returns every mirrored record of a table.
    pub fn entries(&self, table: &str) -> BTreeMap<String, Payload> {
        self.partition(table).map(|p| p.records).unwrap_or_default()
    }

    /// Returns the tables that have a mirror partition.
    pub fn tables(&self) -> Vec<String> {
        match self.storage.namespaces() {
            Ok(namespaces) => namespaces
                .iter()
                .filter_map(|ns| self.config.table_of(ns))
                .map(str::to_string)
                .collect(),
            Err(e) => {
                warn!(error = %e, "cannot list mirror tables");
                Vec::new()
            }
        }
    }

    /// Stores the value of a record, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition cannot be durably updated.
    pub fn put(&self, table: &str, key: &str, data: Payload) -> CoreResult<()> {
        self.modify(table, |records| {
            records.insert(key.to_string(), data.clone());
        })
    }

    /// Forgets a record. Removing an unknown record is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition cannot be durably updated.
    pub fn remove(&self, table: &str, key: &str) -> CoreResult<()> {
        self.modify(table, |records| {
            records.remove(key);
        })
    }

    /// Makes a record reachable under `new_key` as well as `existing_key`.
    ///
    /// The value currently stored under `existing_key` is copied in one
    /// atomic update of the partition. If there is none, for example because
    /// the record was deleted locally, nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition cannot be durably updated.
    pub fn index_under(&self, table: &str, existing_key: &str, new_key: &str) -> CoreResult<()> {
        self.modify(table, |records| {
            if let Some(value) = records.get(existing_key).cloned() {
                records.insert(new_key.to_string(), value);
            }
        })
    }

    fn partition(&self, table: &str) -> Option<MirrorPartition> {
        let namespace = self.config.mirror_namespace(table);
        match load_document::<MirrorPartition>(self.storage.as_ref(), &namespace) {
            Ok(partition) => Some(partition),
            Err(e) => {
                warn!(table, error = %e, "mirror partition unreadable");
                None
            }
        }
    }

    fn modify(
        &self,
        table: &str,
        mut f: impl FnMut(&mut BTreeMap<String, Payload>),
    ) -> CoreResult<()> {
        let namespace = self.config.mirror_namespace(table);
        update_document(self.storage.as_ref(), &namespace, |p: &mut MirrorPartition| {
            f(&mut p.records);
            Ok(())
        })
    }
}
