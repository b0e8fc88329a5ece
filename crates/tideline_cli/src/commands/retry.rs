//! Retry command implementation.

use super::{print_json, OutputFormat, Store};
use serde::Serialize;
use std::path::Path;

/// Outcome of clearing recorded errors.
#[derive(Debug, Serialize)]
pub struct RetryResult {
    /// Pending items whose error was cleared.
    pub cleared: usize,
    /// Items still pending.
    pub pending: usize,
}

/// Clears the recorded errors of an opened store's pending items.
///
/// Pending items are retried on every pass regardless; clearing their
/// errors only resets the diagnostics.
pub fn retry(store: &Store) -> Result<RetryResult, Box<dyn std::error::Error>> {
    Ok(RetryResult {
        cleared: store.queue.clear_errors()?,
        pending: store.queue.pending_count()?,
    })
}

/// Runs the retry command.
pub fn run(path: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path)?;
    let result = retry(&store)?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => println!(
            "Cleared {} error(s); {} item(s) pending",
            result.cleared, result.pending
        ),
    }
    Ok(())
}
