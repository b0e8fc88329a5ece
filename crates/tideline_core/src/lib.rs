//! # Tideline Core
//!
//! Durable write queue and local mirror for Tideline.
//!
//! This crate provides:
//! - [`WriteQueue`] - ordered, durable log of pending mutations
//! - [`MirrorStore`] - table-partitioned cache of records for offline reads
//! - [`Payload`] - schema-agnostic record bodies
//! - [`PassLease`] - expiring claim serializing sync passes over shared storage
//! - Versioned CBOR encoding of everything persisted
//!
//! Nothing here touches the network. Replaying the queue against a remote
//! store is the job of `tideline_sync_engine`.
//!
//! ## Key Invariants
//!
//! - Queue and mirror mutations are atomic read-modify-writes on storage
//! - Pending items are replayed in enqueue order
//! - Processed items are never replayed and only removed by compaction
//! - Malformed mutations are rejected before anything is written
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tideline_core::{Config, MirrorStore, Operation, Payload, WriteQueue};
//! use tideline_storage::InMemoryBackend;
//!
//! let storage = Arc::new(InMemoryBackend::new());
//! let config = Config::default();
//! let mirror = Arc::new(MirrorStore::new(storage.clone(), &config));
//! let queue = WriteQueue::new(storage, mirror.clone(), &config);
//!
//! let data = Payload::encode(&"dark").unwrap();
//! queue.enqueue(Operation::Update, "settings", Some("theme"), Some(data.clone())).unwrap();
//!
//! assert_eq!(queue.pending_count().unwrap(), 1);
//! assert_eq!(mirror.get("settings", "theme"), Some(data));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod error;
mod lease;
mod mirror;
mod payload;
mod queue;
mod types;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use lease::PassLease;
pub use mirror::MirrorStore;
pub use payload::Payload;
pub use queue::{validate_mutation, QueueItem, QueueStats, WriteQueue};
pub use types::{now_millis, ClientId, Operation, Timestamp};
