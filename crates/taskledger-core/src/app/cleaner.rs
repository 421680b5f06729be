//! Retention cleaner: delete old records in bounded batches.

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app::config::CleanerConfig;
use crate::app::guard::DuplicateGuard;
use crate::app::lock::LockKey;
use crate::domain::LedgerError;
use crate::ports::{Clock, RecordStore};

/// Counts from one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub deleted: usize,
    pub batches: usize,
}

/// Deletes terminal records past the retention age, one bounded batch at a
/// time so the store never holds a long delete lock.
///
/// Defense in depth: with `only_completed` off, ancient non-terminal
/// orphans that the reaper never managed to terminate are removed too. The
/// reaper and cleaner touch disjoint record sets in the default
/// configuration (non-terminal vs terminal), so they need no mutual guard,
/// only a guard against their own overlapping passes.
pub struct RetentionCleaner {
    store: Arc<dyn RecordStore>,
    guard: Arc<DuplicateGuard>,
    clock: Arc<dyn Clock>,
    config: CleanerConfig,
}

impl RetentionCleaner {
    pub fn new(
        store: Arc<dyn RecordStore>,
        guard: Arc<DuplicateGuard>,
        clock: Arc<dyn Clock>,
        config: CleanerConfig,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            store,
            guard,
            clock,
            config,
        })
    }

    /// One cleanup pass: keep taking batches until the backlog drains.
    pub async fn run_once(&self) -> Result<CleanReport, LedgerError> {
        let retention = ChronoDuration::from_std(self.config.retention)
            .map_err(|err| LedgerError::Config(format!("retention out of range: {err}")))?;
        let cutoff = self.clock.now() - retention;

        let mut report = CleanReport::default();
        loop {
            let ids = self
                .store
                .list_expired(cutoff, self.config.only_completed, self.config.batch_size)
                .await?;
            if ids.is_empty() {
                break;
            }

            let batch_len = ids.len();
            report.deleted += self.store.delete_many(&ids).await?;
            report.batches += 1;

            if batch_len < self.config.batch_size {
                break;
            }
            debug!(
                batch = batch_len,
                "cleanup batch filled; taking another immediately"
            );
        }

        if report.deleted > 0 {
            info!(
                deleted = report.deleted,
                batches = report.batches,
                %cutoff,
                only_completed = self.config.only_completed,
                "cleanup pass deleted old executions"
            );
        }
        Ok(report)
    }

    /// Periodic loop, guarded against overlapping with its own previous pass.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let key = LockKey::new("retention_cleaner");
        info!(
            interval_secs = self.config.interval.as_secs(),
            retention_secs = self.config.retention.as_secs(),
            "cleaner loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("cleaner loop shutting down");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.interval) => {
                    let outcome = self
                        .guard
                        .run(&key, self.config.lock_ttl, self.run_once())
                        .await;
                    match outcome {
                        Ok(outcome) if outcome.was_skipped() => {
                            debug!("cleanup tick skipped: previous pass still running");
                        }
                        Ok(_) => {}
                        Err(err) => warn!(error = %err, "cleanup pass errored"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::app::lock::LockManager;
    use crate::app::tracker::{ExecutionTracker, RegisterOptions};
    use crate::domain::{StatusUpdate, TaskStatus};
    use crate::impls::{InMemoryLockStore, InMemoryRecordStore};
    use crate::ports::{FixedClock, RemoteStatus, StatusSource};
    use async_trait::async_trait;

    struct SilentSource;

    #[async_trait]
    impl StatusSource for SilentSource {
        async fn fetch(&self, _task_id: &str) -> Result<Option<RemoteStatus>, LedgerError> {
            Ok(None)
        }
    }

    struct Fixture {
        cleaner: RetentionCleaner,
        tracker: ExecutionTracker,
        store: Arc<InMemoryRecordStore>,
        clock: Arc<FixedClock>,
    }

    fn fixture(config: CleanerConfig) -> Fixture {
        let clock = Arc::new(FixedClock::at(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(InMemoryRecordStore::new());
        let tracker = ExecutionTracker::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::new(SilentSource),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let locks = Arc::new(LockManager::new(
            Arc::new(InMemoryLockStore::new(Arc::clone(&clock) as Arc<dyn Clock>)),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let guard = Arc::new(DuplicateGuard::new(locks));
        let cleaner = RetentionCleaner::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            guard,
            Arc::clone(&clock) as Arc<dyn Clock>,
            config,
        )
        .unwrap();
        Fixture {
            cleaner,
            tracker,
            store,
            clock,
        }
    }

    #[tokio::test]
    async fn only_completed_spares_non_terminal_records() {
        let f = fixture(CleanerConfig {
            retention: Duration::ZERO,
            ..CleanerConfig::default()
        });

        // One SUCCESS and one STARTED record, both "created yesterday".
        f.tracker
            .register("done", "send_report", "reports", RegisterOptions::default())
            .await
            .unwrap();
        f.tracker
            .update("done", StatusUpdate::status(TaskStatus::Success))
            .await
            .unwrap();
        f.tracker
            .register(
                "running",
                "send_report",
                "reports",
                RegisterOptions {
                    initial_status: Some(TaskStatus::Started),
                    ..RegisterOptions::default()
                },
            )
            .await
            .unwrap();

        f.clock.advance(ChronoDuration::days(1));
        let report = f.cleaner.run_once().await.unwrap();
        assert_eq!(report.deleted, 1);

        assert!(f.store.get("done").await.unwrap().is_none());
        assert!(f.store.get("running").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn orphan_cleanup_deletes_non_terminal_records_too() {
        let f = fixture(CleanerConfig {
            retention: Duration::ZERO,
            only_completed: false,
            ..CleanerConfig::default()
        });

        f.tracker
            .register(
                "orphan",
                "send_report",
                "reports",
                RegisterOptions {
                    initial_status: Some(TaskStatus::Started),
                    ..RegisterOptions::default()
                },
            )
            .await
            .unwrap();

        f.clock.advance(ChronoDuration::days(1));
        let report = f.cleaner.run_once().await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(f.store.get("orphan").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_records_survive() {
        let f = fixture(CleanerConfig {
            retention: Duration::from_secs(180 * 24 * 60 * 60),
            ..CleanerConfig::default()
        });

        f.tracker
            .register("fresh", "send_report", "reports", RegisterOptions::default())
            .await
            .unwrap();
        f.tracker
            .update("fresh", StatusUpdate::status(TaskStatus::Success))
            .await
            .unwrap();

        f.clock.advance(ChronoDuration::days(30));
        let report = f.cleaner.run_once().await.unwrap();
        assert_eq!(report, CleanReport::default());
        assert!(f.store.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn backlog_drains_in_bounded_batches() {
        let f = fixture(CleanerConfig {
            retention: Duration::ZERO,
            batch_size: 2,
            ..CleanerConfig::default()
        });

        for i in 0..5 {
            let id = format!("t{i}");
            f.tracker
                .register(&id, "send_report", "reports", RegisterOptions::default())
                .await
                .unwrap();
            f.tracker
                .update(&id, StatusUpdate::status(TaskStatus::Success))
                .await
                .unwrap();
        }

        f.clock.advance(ChronoDuration::hours(1));
        let report = f.cleaner.run_once().await.unwrap();
        assert_eq!(report.deleted, 5);
        assert_eq!(report.batches, 3);
    }
}
