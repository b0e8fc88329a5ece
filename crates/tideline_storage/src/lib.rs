//! # Tideline Storage
//!
//! Durable local storage for Tideline.
//!
//! Backends are **opaque blob stores** addressed by namespace. They do not
//! interpret the bytes they hold; the queue log and mirror partitions are
//! encoded by `tideline_core`.
//!
//! ## Design Principles
//!
//! - One blob per namespace (read, write, remove)
//! - Read-modify-write through [`StorageBackend::update`] is atomic, also
//!   across independent handles opened on the same storage
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral clients
//! - [`FileBackend`] - One file per namespace in a directory
//!
//! ## Example
//!
//! ```rust
//! use tideline_storage::{StorageBackend, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.write("sync_queue", b"hello").unwrap();
//! assert_eq!(backend.read("sync_queue").unwrap().as_deref(), Some(&b"hello"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{StorageBackend, UpdateFn};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
