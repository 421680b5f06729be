//! Configuration for the janitor processes.
//!
//! Defaults are deliberately conservative: a 10 minute run timeout, 180 days
//! of retention, terminal-only cleanup. Validation happens at construction
//! and is the only fail-fast path in the crate; everything after startup
//! degrades by logging and skipping.

use std::time::Duration;

use crate::domain::LedgerError;

/// Stale-run reaper settings.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Non-terminal runs with `started_at` older than this are candidates
    /// for an administrative timeout failure.
    pub timeout: Duration,

    /// How often the periodic loop runs a pass.
    pub interval: Duration,

    /// Upper bound on candidates examined per pass.
    pub batch_limit: usize,

    /// TTL of the lock guarding against overlapping reaper passes.
    pub lock_ttl: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10 * 60),
            interval: Duration::from_secs(30 * 60),
            batch_limit: 500,
            lock_ttl: Duration::from_secs(10 * 60),
        }
    }
}

impl ReaperConfig {
    /// Zero `timeout` is legal and means "every started run is already
    /// stale"; useful in tests and for draining a store.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.batch_limit == 0 {
            return Err(LedgerError::Config(
                "reaper batch_limit must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Retention cleaner settings.
#[derive(Debug, Clone)]
pub struct CleanerConfig {
    /// Records with `created_at` older than this are eligible for deletion.
    pub retention: Duration,

    /// How often the periodic loop runs a pass.
    pub interval: Duration,

    /// Records deleted per batch; a pass keeps taking batches until the
    /// backlog drains, so no single delete is unbounded.
    pub batch_size: usize,

    /// When true only terminal records are deleted. When false, ancient
    /// non-terminal orphans the reaper never caught are removed as well.
    pub only_completed: bool,

    /// TTL of the lock guarding against overlapping cleaner passes.
    pub lock_ttl: Duration,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(180 * 24 * 60 * 60),
            interval: Duration::from_secs(24 * 60 * 60),
            batch_size: 5000,
            only_completed: true,
            lock_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl CleanerConfig {
    /// Zero `retention` is legal and deletes everything eligible.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.batch_size == 0 {
            return Err(LedgerError::Config(
                "cleaner batch_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Reconciler settings for the periodic loop.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How often the periodic loop runs a pass.
    pub interval: Duration,

    /// Upper bound on records synced per pass, oldest first.
    pub batch_limit: usize,

    /// TTL of the lock guarding against overlapping reconcile passes.
    pub lock_ttl: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            batch_limit: 1000,
            lock_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.batch_limit == 0 {
            return Err(LedgerError::Config(
                "reconciler batch_limit must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ReaperConfig::default().validate().unwrap();
        CleanerConfig::default().validate().unwrap();
        ReconcilerConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_batch_sizes_are_rejected() {
        let reaper = ReaperConfig {
            batch_limit: 0,
            ..ReaperConfig::default()
        };
        assert!(reaper.validate().is_err());

        let cleaner = CleanerConfig {
            batch_size: 0,
            ..CleanerConfig::default()
        };
        assert!(cleaner.validate().is_err());
    }
}
