//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;

/// How the engine treats items that target a not-yet-synced INSERT.
///
/// An UPDATE or DELETE enqueued against the client id of an INSERT cannot
/// succeed remotely until that INSERT has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyPolicy {
    /// Record a failure for the item without contacting the remote store;
    /// it is retried on later passes.
    #[default]
    Attempt,
    /// Skip the item, without recording a failure, until its INSERT is
    /// processed.
    Defer,
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound for a single remote call.
    pub request_timeout: Duration,
    /// How often the scheduler samples connectivity and pending items.
    pub poll_interval: Duration,
    /// Whether to compact the queue after every pass.
    pub compact_after_pass: bool,
    /// Treatment of items depending on an unsynced INSERT.
    pub dependency_policy: DependencyPolicy,
    /// Lifetime of the pass lease; renewed before every item.
    pub lease_ttl: Duration,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            compact_after_pass: true,
            dependency_policy: DependencyPolicy::Attempt,
            lease_ttl: Duration::from_secs(90),
        }
    }

    /// Sets the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the scheduler poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets whether each pass ends with a compaction.
    pub fn with_compact_after_pass(mut self, compact: bool) -> Self {
        self.compact_after_pass = compact;
        self
    }

    /// Sets the dependency policy.
    pub fn with_dependency_policy(mut self, policy: DependencyPolicy) -> Self {
        self.dependency_policy = policy;
        self
    }

    /// Sets the pass lease lifetime.
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidConfig` for zero durations, or a lease
    /// that does not outlive a single remote call.
    pub fn validate(&self) -> SyncResult<()> {
        if self.request_timeout.is_zero() {
            return Err(SyncError::InvalidConfig(
                "request timeout must be positive".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(SyncError::InvalidConfig(
                "poll interval must be positive".into(),
            ));
        }
        if self.lease_ttl <= self.request_timeout {
            return Err(SyncError::InvalidConfig(
                "lease ttl must exceed the request timeout".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
