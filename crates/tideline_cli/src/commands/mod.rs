//! CLI command implementations.

pub mod compact;
pub mod inspect;
pub mod mirror;
pub mod pending;
pub mod retry;

use clap::ValueEnum;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tideline_core::{Config, MirrorStore, Payload, WriteQueue};
use tideline_storage::FileBackend;

/// Output format of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Errors specific to the CLI.
#[derive(Error, Debug)]
pub enum CliError {
    /// The path does not hold a store.
    #[error("no store found at {0}")]
    StoreNotFound(PathBuf),
}

/// An opened file-backed store.
pub struct Store {
    /// Raw storage.
    pub storage: Arc<FileBackend>,
    /// Namespace configuration.
    pub config: Config,
    /// The write queue.
    pub queue: WriteQueue,
    /// The local mirror.
    pub mirror: Arc<MirrorStore>,
}

impl Store {
    /// Opens the store at `path`, which must be an existing directory.
    pub fn open(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.is_dir() {
            return Err(CliError::StoreNotFound(path.to_path_buf()).into());
        }
        let storage = Arc::new(FileBackend::open(path)?);
        let config = Config::default();
        let mirror = Arc::new(MirrorStore::new(storage.clone(), &config));
        let queue = WriteQueue::new(storage.clone(), mirror.clone(), &config);
        Ok(Self {
            storage,
            config,
            queue,
            mirror,
        })
    }
}

/// Renders a payload as JSON, or as a size marker if it has no JSON form.
pub fn payload_json(payload: &Payload) -> serde_json::Value {
    payload
        .decode::<serde_json::Value>()
        .unwrap_or_else(|_| serde_json::Value::String(format!("<{} bytes>", payload.len())))
}

/// Prints `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(Store::open(&missing).is_err());
        assert!(!missing.exists());
        assert!(Store::open(dir.path()).is_ok());
    }

    #[test]
    fn payload_rendering() {
        let payload = Payload::encode(&serde_json::json!({"value": "dark"})).unwrap();
        assert_eq!(payload_json(&payload), serde_json::json!({"value": "dark"}));

        let raw = Payload::from_bytes(vec![0xff]);
        assert_eq!(payload_json(&raw), serde_json::json!("<1 bytes>"));
    }
}
