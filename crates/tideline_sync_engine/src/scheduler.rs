//! Background driver for sync passes.

use crate::connectivity::{ConnectivityMonitor, Transition};
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::state::SyncEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Runs sync passes on reconnection and periodically while online.
///
/// On every `poll_interval` tick the scheduler samples the monitor's
/// probe; if the remote is reachable and items are pending, it runs a pass.
/// Each offline to online transition seen on the monitor's channel runs one
/// pass as well. Overlapping triggers are coalesced by the engine.
pub struct SyncScheduler;

impl SyncScheduler {
    /// Spawns the scheduler on the current tokio runtime.
    ///
    /// Dropping the returned handle stops the scheduler too.
    pub fn spawn<R>(
        engine: Arc<SyncEngine<R>>,
        monitor: Arc<ConnectivityMonitor>,
        poll_interval: Duration,
    ) -> SchedulerHandle
    where
        R: RemoteStore + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let online = monitor.subscribe();
        let task = tokio::spawn(run(engine, monitor, online, poll_interval, stop_rx));
        SchedulerHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Handle to a running [`SyncScheduler`].
pub struct SchedulerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Returns true once the scheduler task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the scheduler and waits for it to exit.
    ///
    /// A pass in progress runs to completion first.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SchedulerStopped` if the task panicked.
    pub async fn shutdown(mut self) -> SyncResult<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| SyncError::SchedulerStopped(e.to_string()))
    }
}

async fn run<R: RemoteStore>(
    engine: Arc<SyncEngine<R>>,
    monitor: Arc<ConnectivityMonitor>,
    mut online: watch::Receiver<bool>,
    poll_interval: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(?poll_interval, "sync scheduler started");
    loop {
        tokio::select! {
            _ = &mut stop => break,
            changed = online.changed() => {
                if changed.is_err() {
                    break;
                }
                if *online.borrow_and_update() {
                    run_pass(&engine, "reconnected").await;
                }
            }
            _ = ticker.tick() => {
                if monitor.poll() == Transition::CameOnline {
                    // The channel branch runs the pass for this transition.
                    continue;
                }
                let status = monitor.current_status();
                if !status.is_offline && status.is_pending_sync {
                    run_pass(&engine, "periodic").await;
                }
            }
        }
    }
    debug!("sync scheduler stopped");
}

async fn run_pass<R: RemoteStore>(engine: &SyncEngine<R>, trigger: &'static str) {
    debug!(trigger, "scheduled sync pass");
    if let Err(e) = engine.sync_once().await {
        warn!(trigger, error = %e, "scheduled sync pass failed");
    }
}
