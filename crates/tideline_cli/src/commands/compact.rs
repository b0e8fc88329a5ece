//! Compact command implementation.

use super::{print_json, OutputFormat, Store};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Compaction statistics.
#[derive(Debug, Serialize)]
pub struct CompactStats {
    /// Items before compaction.
    pub items_before: usize,
    /// Processed items removed, or removable on a dry run.
    pub removed: usize,
    /// Whether the queue was left untouched.
    pub dry_run: bool,
}

/// Compacts the queue of an opened store.
pub fn compact(store: &Store, dry_run: bool) -> Result<CompactStats, Box<dyn std::error::Error>> {
    let stats = store.queue.stats()?;
    let removed = if dry_run {
        stats.processed
    } else {
        store.queue.compact()?
    };
    Ok(CompactStats {
        items_before: stats.pending + stats.processed,
        removed,
        dry_run,
    })
}

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path)?;
    let stats = compact(&store, dry_run)?;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Text => {
            println!("Compacting queue at {}", path.display());
            if dry_run {
                println!("(dry run - no changes will be made)");
            }
            println!("  Items:     {}", stats.items_before);
            println!("  Removable: {}", stats.removed);
            if !dry_run {
                if stats.removed > 0 {
                    println!("✓ Compaction complete");
                } else {
                    println!("No compaction needed - queue has no processed items");
                }
            }
        }
    }
    if !dry_run {
        info!(removed = stats.removed, "queue compacted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tideline_core::Operation;

    #[test]
    fn dry_run_leaves_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let id = store
            .queue
            .enqueue(Operation::Delete, "users", Some("1"), None)
            .unwrap();
        store
            .queue
            .enqueue(Operation::Delete, "users", Some("2"), None)
            .unwrap();
        store.queue.mark_processed(id, None).unwrap();

        let stats = compact(&store, true).unwrap();
        assert_eq!(stats.removed, 1);
        assert_eq!(store.queue.len().unwrap(), 2);

        let stats = compact(&store, false).unwrap();
        assert_eq!(stats.items_before, 2);
        assert_eq!(stats.removed, 1);
        assert_eq!(store.queue.len().unwrap(), 1);

        assert_eq!(compact(&store, false).unwrap().removed, 0);
    }
}
