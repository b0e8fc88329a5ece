//! Inspect command implementation.

use super::{print_json, OutputFormat, Store};
use serde::Serialize;
use std::path::Path;
use tideline_core::codec::FORMAT_VERSION;
use tideline_core::Timestamp;
use tideline_sync_engine::ConnectivityMonitor;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Format version this build reads and writes.
    pub format_version: u16,
    /// Items in the queue log, processed or not.
    pub queue_items: usize,
    /// Unprocessed items.
    pub pending: usize,
    /// Processed items awaiting compaction.
    pub processed: usize,
    /// Pending items carrying an error.
    pub failing: usize,
    /// Recorded client id to remote id mappings.
    pub remote_ids: usize,
    /// Enqueue time of the oldest pending item.
    pub oldest_pending_at: Option<Timestamp>,
    /// Last transition to online.
    pub last_online_at: Option<Timestamp>,
    /// Mirror tables.
    pub tables: Vec<TableStats>,
}

/// Statistics for a single mirror table.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of mirrored records.
    pub records: usize,
}

/// Gathers inspection data from an opened store.
pub fn collect(store: &Store, path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let stats = store.queue.stats()?;
    let pending = store.queue.pending_items()?;
    let last_online_at =
        ConnectivityMonitor::load_last_online(store.storage.as_ref(), &store.config)?;

    let tables = store
        .mirror
        .tables()
        .into_iter()
        .map(|name| TableStats {
            records: store.mirror.entries(&name).len(),
            name,
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        format_version: FORMAT_VERSION,
        queue_items: stats.pending + stats.processed,
        pending: stats.pending,
        processed: stats.processed,
        failing: stats.failing,
        remote_ids: stats.remote_ids,
        oldest_pending_at: pending.first().map(|i| i.created_at),
        last_online_at,
        tables,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path)?;
    let result = collect(&store, path)?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Tideline Store: {}", result.path);
    println!("Format version: {}", result.format_version);
    println!();
    println!("Queue:");
    println!("  Items:       {}", result.queue_items);
    println!("  Pending:     {}", result.pending);
    println!("  Processed:   {}", result.processed);
    println!("  Failing:     {}", result.failing);
    println!("  Remote ids:  {}", result.remote_ids);
    if let Some(at) = result.oldest_pending_at {
        println!("  Oldest:      {at} ms");
    }
    println!();
    match result.last_online_at {
        Some(at) => println!("Last online: {at} ms"),
        None => println!("Last online: never"),
    }
    println!();
    if result.tables.is_empty() {
        println!("Mirror: empty");
    } else {
        println!("Mirror:");
        for table in &result.tables {
            println!("  {:<20} {} records", table.name, table.records);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tideline_core::{Operation, Payload};

    #[test]
    fn collects_queue_and_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let data = Payload::encode(&"dark").unwrap();

        let first = store
            .queue
            .enqueue(Operation::Update, "settings", Some("theme"), Some(data.clone()))
            .unwrap();
        store
            .queue
            .enqueue(Operation::Insert, "users", None, Some(data))
            .unwrap();
        store.queue.mark_processed(first, None).unwrap();

        let result = collect(&store, dir.path()).unwrap();
        assert_eq!(result.queue_items, 2);
        assert_eq!(result.pending, 1);
        assert_eq!(result.processed, 1);
        assert_eq!(result.last_online_at, None);
        assert!(result.oldest_pending_at.is_some());
        let names: Vec<_> = result.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["settings", "users"]);
    }
}
