//! # Tideline Sync Engine
//!
//! Connectivity tracking and queue replay for Tideline.
//!
//! This crate provides:
//! - [`RemoteStore`] - the backing store abstraction, plus an in-memory mock
//! - [`SyncEngine`] - replays the write queue in enqueue order
//! - [`ConnectivityMonitor`] - online/offline status and reconnection events
//! - [`SyncScheduler`] - runs passes on reconnection and on a timer
//! - [`OfflineClient`] - write-through with queue fallback for consumers
//!
//! ## Architecture
//!
//! Writes made while offline, or whose remote call failed, land in the
//! durable [`tideline_core::WriteQueue`] and update the local mirror at
//! once. When connectivity returns, the engine drains the queue:
//! 1. Pending items are replayed oldest first
//! 2. Successes are marked processed; INSERTs record their remote id
//! 3. Failures are annotated and retried on the next pass
//! 4. Processed items are compacted away
//!
//! ## Key Invariants
//!
//! - Delivery is at-least-once per item until it succeeds
//! - At most one pass runs at a time per engine
//! - Remote failures never reach the writer
//! - Local storage failures abort the pass

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod connectivity;
mod error;
mod remote;
mod scheduler;
mod state;

pub use client::{OfflineClient, WriteOutcome};
pub use config::{DependencyPolicy, SyncConfig};
pub use connectivity::{
    ConnectivityMonitor, ConnectivityProbe, ConnectivityState, ManualProbe, Transition,
};
pub use error::{RemoteError, RemoteResult, SyncError, SyncResult};
pub use remote::{MockRemoteStore, RemoteCall, RemoteStore};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use state::{SyncEngine, SyncReport, SyncState, SyncStats};
