//! Connectivity tracking.

use crate::error::SyncResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tideline_core::codec::{decode_document, encode_document};
use tideline_core::{now_millis, Config, Timestamp, WriteQueue};
use tideline_storage::StorageBackend;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A platform connectivity signal.
pub trait ConnectivityProbe: Send + Sync {
    /// Returns the best-effort current connectivity.
    fn is_online(&self) -> bool;
}

/// A probe whose answer is set by the host.
#[derive(Debug)]
pub struct ManualProbe {
    online: AtomicBool,
}

impl ManualProbe {
    /// Creates a probe with the given initial answer.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Changes the answer.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for ManualProbe {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Snapshot of connectivity and queue health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectivityState {
    /// True while the remote store is believed unreachable.
    pub is_offline: bool,
    /// Last transition to online, in unix milliseconds.
    pub last_online_at: Option<Timestamp>,
    /// Unprocessed queue items.
    pub pending_count: usize,
    /// True if there is anything to sync.
    pub is_pending_sync: bool,
}

/// A change reported by [`ConnectivityMonitor::set_online`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Offline to online.
    CameOnline,
    /// Online to offline.
    WentOffline,
    /// No change.
    Unchanged,
}

#[derive(Debug, Serialize, Deserialize)]
struct LastOnline {
    at: Timestamp,
}

#[derive(Debug)]
struct MonitorState {
    online: bool,
    last_online_at: Option<Timestamp>,
    last_pending: usize,
}

/// Tracks online/offline status and announces reconnections.
///
/// Every offline to online transition persists the time it happened and
/// is published on a watch channel (see [`ConnectivityMonitor::subscribe`]).
/// The monitor does not start sync passes itself.
pub struct ConnectivityMonitor {
    storage: Arc<dyn StorageBackend>,
    namespace: String,
    queue: Arc<WriteQueue>,
    probe: Arc<dyn ConnectivityProbe>,
    state: Mutex<MonitorState>,
    online_tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor, seeding its status from `probe`.
    ///
    /// Loads the persisted last-online time; if the probe reports online,
    /// records the current time instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted record exists but cannot be read
    /// or decoded.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        queue: Arc<WriteQueue>,
        probe: Arc<dyn ConnectivityProbe>,
        config: &Config,
    ) -> SyncResult<Self> {
        let namespace = config.connectivity_namespace.clone();
        let persisted = Self::load_last_online(storage.as_ref(), config)?;

        let online = probe.is_online();
        let (online_tx, _) = watch::channel(online);
        let monitor = Self {
            storage,
            namespace,
            queue,
            probe,
            state: Mutex::new(MonitorState {
                online,
                last_online_at: persisted,
                last_pending: 0,
            }),
            online_tx,
        };
        if online {
            monitor.record_online(now_millis());
        }
        Ok(monitor)
    }

    /// Reads the persisted last-online time without creating a monitor.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or decoded.
    pub fn load_last_online(
        storage: &dyn StorageBackend,
        config: &Config,
    ) -> SyncResult<Option<Timestamp>> {
        match storage.read(&config.connectivity_namespace)? {
            Some(bytes) => Ok(Some(decode_document::<LastOnline>(&bytes)?.at)),
            None => Ok(None),
        }
    }

    /// Returns the current status. Never fails.
    ///
    /// If the queue cannot be read, the last known pending count is
    /// reported.
    pub fn current_status(&self) -> ConnectivityState {
        let pending = self.queue.pending_count();
        let mut state = self.state.lock();
        match pending {
            Ok(count) => state.last_pending = count,
            Err(e) => warn!(error = %e, "cannot read pending count, reporting last known"),
        }
        ConnectivityState {
            is_offline: !state.online,
            last_online_at: state.last_online_at,
            pending_count: state.last_pending,
            is_pending_sync: state.last_pending > 0,
        }
    }

    /// Returns true if the monitor believes the remote is reachable.
    pub fn is_online(&self) -> bool {
        self.state.lock().online
    }

    /// Returns the last transition to online.
    pub fn last_online_at(&self) -> Option<Timestamp> {
        self.state.lock().last_online_at
    }

    /// Records a connectivity event from the host.
    pub fn set_online(&self, online: bool) -> Transition {
        let transition = {
            let mut state = self.state.lock();
            let previous = std::mem::replace(&mut state.online, online);
            match (previous, online) {
                (false, true) => Transition::CameOnline,
                (true, false) => Transition::WentOffline,
                _ => Transition::Unchanged,
            }
        };

        match transition {
            Transition::CameOnline => {
                self.record_online(now_millis());
                info!("connectivity restored");
                self.online_tx.send_replace(true);
            }
            Transition::WentOffline => {
                info!("connectivity lost");
                self.online_tx.send_replace(false);
            }
            Transition::Unchanged => {}
        }
        transition
    }

    /// Samples the probe and records any change.
    pub fn poll(&self) -> Transition {
        self.set_online(self.probe.is_online())
    }

    /// Subscribes to connectivity changes. The value is true while online.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online_tx.subscribe()
    }

    fn record_online(&self, at: Timestamp) {
        self.state.lock().last_online_at = Some(at);
        match self.persist(at) {
            Ok(()) => debug!(at, "last online time recorded"),
            Err(e) => warn!(error = %e, "cannot persist last online time"),
        }
    }

    fn persist(&self, at: Timestamp) -> SyncResult<()> {
        let bytes = encode_document(&LastOnline { at })?;
        self.storage.write(&self.namespace, &bytes)?;
        Ok(())
    }
}
