//! Configuration for the sync engine.

use crate::backoff::BackoffPolicy;
use crate::conflict::ConflictStrategy;
use std::time::Duration;

/// Configuration for sync passes and scheduling.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backoff policy applied to failed records.
    pub backoff: BackoffPolicy,
    /// Conflict resolution strategy.
    pub conflict_strategy: ConflictStrategy,
    /// Interval between periodic passes while foregrounded.
    pub sync_interval: Duration,
    /// Quiet period applied to connectivity-regained triggers.
    pub debounce: Duration,
    /// Upper bound on a single remote call. The engine does not enforce
    /// this itself: `RemoteTransport` implementations are constructed with
    /// it and must fail the call with `SyncError::Timeout` once it elapses.
    pub remote_timeout: Duration,
    /// Whether low battery suppresses sync passes.
    pub battery_aware: bool,
}

impl SyncConfig {
    /// Creates a configuration with production defaults.
    pub fn new() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            conflict_strategy: ConflictStrategy::LatestWins,
            sync_interval: Duration::from_secs(30),
            debounce: Duration::from_millis(250),
            remote_timeout: Duration::from_secs(30),
            battery_aware: true,
        }
    }

    /// Sets the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the conflict strategy.
    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }

    /// Sets the periodic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the connectivity debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the remote call timeout enforced by the transport.
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Enables or disables battery-aware gating.
    pub fn with_battery_aware(mut self, battery_aware: bool) -> Self {
        self.battery_aware = battery_aware;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.backoff.base_delay, Duration::from_millis(100));
        assert_eq!(config.backoff.max_delay, Duration::from_millis(60_000));
        assert_eq!(config.backoff.max_retries, 5);
        assert_eq!(config.conflict_strategy, ConflictStrategy::LatestWins);
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert!(config.battery_aware);
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new()
            .with_conflict_strategy(ConflictStrategy::Merge)
            .with_sync_interval(Duration::from_secs(60))
            .with_debounce(Duration::from_millis(100))
            .with_battery_aware(false);

        assert_eq!(config.conflict_strategy, ConflictStrategy::Merge);
        assert_eq!(config.sync_interval, Duration::from_secs(60));
        assert_eq!(config.debounce, Duration::from_millis(100));
        assert!(!config.battery_aware);
    }
}
