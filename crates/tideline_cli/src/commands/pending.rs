//! Pending command implementation.

use super::{payload_json, print_json, OutputFormat, Store};
use serde::Serialize;
use std::path::Path;
use tideline_core::{QueueItem, Timestamp};

/// One pending item, as displayed.
#[derive(Debug, Serialize)]
pub struct PendingEntry {
    /// Position in replay order.
    pub seq: u64,
    /// Client-generated identifier.
    pub client_id: String,
    /// Mutation kind.
    pub operation: String,
    /// Target table.
    pub table: String,
    /// Target record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// INSERT this item waits on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    /// Enqueue time in unix milliseconds.
    pub created_at: Timestamp,
    /// Replay attempts so far.
    pub attempts: u32,
    /// Last failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payload, decoded where possible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<&QueueItem> for PendingEntry {
    fn from(item: &QueueItem) -> Self {
        Self {
            seq: item.seq,
            client_id: item.client_id.to_string(),
            operation: item.operation.to_string(),
            table: item.table_name.clone(),
            record_id: item.record_id.clone(),
            depends_on: item.depends_on.map(|id| id.to_string()),
            created_at: item.created_at,
            attempts: item.attempts,
            error: item.error.clone(),
            data: item.data.as_ref().map(payload_json),
        }
    }
}

/// Lists pending items in replay order.
pub fn collect(
    store: &Store,
    limit: Option<usize>,
    errors_only: bool,
) -> Result<Vec<PendingEntry>, Box<dyn std::error::Error>> {
    Ok(store
        .queue
        .pending_items()?
        .iter()
        .filter(|i| !errors_only || i.error.is_some())
        .take(limit.unwrap_or(usize::MAX))
        .map(PendingEntry::from)
        .collect())
}

/// Runs the pending command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    errors_only: bool,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path)?;
    let entries = collect(&store, limit, errors_only)?;

    match format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No pending items");
            }
            for entry in &entries {
                println!(
                    "#{:<5} {:<6} {}/{} [{}] attempts={}",
                    entry.seq,
                    entry.operation,
                    entry.table,
                    entry.record_id.as_deref().unwrap_or("-"),
                    entry.client_id,
                    entry.attempts
                );
                if let Some(error) = &entry.error {
                    println!("       error: {error}");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tideline_core::Operation;

    #[test]
    fn lists_in_order_with_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let ids: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|key| {
                store
                    .queue
                    .enqueue(Operation::Delete, "modules", Some(key), None)
                    .unwrap()
            })
            .collect();
        store.queue.mark_failed(ids[1], "timeout").unwrap();

        let all = collect(&store, None, false).unwrap();
        let keys: Vec<_> = all.iter().map(|e| e.record_id.as_deref().unwrap()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(all[0].operation, "DELETE");

        assert_eq!(collect(&store, Some(2), false).unwrap().len(), 2);

        let failing = collect(&store, None, true).unwrap();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].error.as_deref(), Some("timeout"));
    }
}
