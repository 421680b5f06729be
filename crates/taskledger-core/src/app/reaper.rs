//! Stale-run reaper: administrative timeout for runs nobody reported on.

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app::config::ReaperConfig;
use crate::app::guard::DuplicateGuard;
use crate::app::lock::LockKey;
use crate::app::tracker::ExecutionTracker;
use crate::domain::{LedgerError, StatusUpdate, TaskStatus};
use crate::ports::{Clock, RecordStore};

/// Counts from one reaper pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub scanned: usize,

    /// Marked FAILURE with a synthetic timeout error.
    pub reaped: usize,

    /// Turned out to be finished once the scheduler was asked; only the
    /// local record was stale.
    pub recovered: usize,

    pub failed: usize,
}

/// Scans for runs stuck in a non-terminal status past the timeout and marks
/// them failed.
///
/// Two-step check-then-reap: each candidate is first re-synced from the
/// external source, because a "stale" record may just be reporting lag from
/// a run that actually finished. Only candidates still non-terminal after
/// that check are failed.
pub struct StaleRunReaper {
    tracker: Arc<ExecutionTracker>,
    store: Arc<dyn RecordStore>,
    guard: Arc<DuplicateGuard>,
    clock: Arc<dyn Clock>,
    config: ReaperConfig,
}

impl StaleRunReaper {
    pub fn new(
        tracker: Arc<ExecutionTracker>,
        store: Arc<dyn RecordStore>,
        guard: Arc<DuplicateGuard>,
        clock: Arc<dyn Clock>,
        config: ReaperConfig,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            tracker,
            store,
            guard,
            clock,
            config,
        })
    }

    /// One reaper pass.
    pub async fn run_once(&self) -> Result<ReapReport, LedgerError> {
        let timeout = ChronoDuration::from_std(self.config.timeout)
            .map_err(|err| LedgerError::Config(format!("reaper timeout out of range: {err}")))?;
        let cutoff = self.clock.now() - timeout;

        let ids = self
            .store
            .list_stale(cutoff, self.config.batch_limit)
            .await?;
        let mut report = ReapReport {
            scanned: ids.len(),
            ..ReapReport::default()
        };

        for task_id in ids {
            // Best-effort refresh first; sync failures fall back to the
            // local record rather than skipping the reap.
            let record = match self.tracker.sync_from_source(&task_id).await {
                Ok(record) => record,
                Err(LedgerError::NotFound(_)) => {
                    // Deleted between the scan and now; nothing to do.
                    continue;
                }
                Err(err) => {
                    warn!(task_id = %task_id, error = %err, "pre-reap sync failed; using local record");
                    match self.tracker.get(&task_id).await {
                        Ok(record) => record,
                        Err(_) => {
                            report.failed += 1;
                            continue;
                        }
                    }
                }
            };

            if record.status.is_terminal() {
                report.recovered += 1;
                continue;
            }
            // The sync may have moved started_at-less Pending along; only
            // runs still started-and-stale get the synthetic failure.
            let still_stale = record.started_at.is_some_and(|t| t < cutoff);
            if !still_stale {
                report.recovered += 1;
                continue;
            }

            let error = format!(
                "run timeout (exceeded {}s, started before {})",
                self.config.timeout.as_secs(),
                cutoff
            );
            match self
                .tracker
                .update(&task_id, StatusUpdate::status(TaskStatus::Failure).with_error(error))
                .await
            {
                Ok(_) => {
                    info!(task_id = %task_id, "marked stale run as failed");
                    report.reaped += 1;
                }
                Err(err) => {
                    warn!(task_id = %task_id, error = %err, "failed to mark stale run");
                    report.failed += 1;
                }
            }
        }

        if report.reaped > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                reaped = report.reaped,
                recovered = report.recovered,
                failed = report.failed,
                "reaper pass finished"
            );
        }
        Ok(report)
    }

    /// Periodic loop. Each tick runs one pass under its own lock so two
    /// reaper passes never race on the same records.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let key = LockKey::new("stale_run_reaper");
        info!(
            interval_secs = self.config.interval.as_secs(),
            timeout_secs = self.config.timeout.as_secs(),
            "reaper loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("reaper loop shutting down");
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
                            debug!("reaper tick skipped: previous pass still running");
                        }
                        Ok(_) => {}
                        Err(err) => warn!(error = %err, "reaper pass errored"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::app::lock::LockManager;
    use crate::app::tracker::RegisterOptions;
    use crate::impls::{InMemoryLockStore, InMemoryRecordStore};
    use crate::ports::{FixedClock, RemoteStatus, StatusSource};

    struct MapSource {
        answers: Mutex<HashMap<String, RemoteStatus>>,
    }

    #[async_trait]
    impl StatusSource for MapSource {
        async fn fetch(&self, task_id: &str) -> Result<Option<RemoteStatus>, LedgerError> {
            Ok(self.answers.lock().unwrap().get(task_id).cloned())
        }
    }

    struct Fixture {
        reaper: StaleRunReaper,
        tracker: Arc<ExecutionTracker>,
        clock: Arc<FixedClock>,
        source: Arc<MapSource>,
    }

    fn fixture(timeout: Duration) -> Fixture {
        let clock = Arc::new(FixedClock::at(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(InMemoryRecordStore::new());
        let source = Arc::new(MapSource {
            answers: Mutex::new(HashMap::new()),
        });
        let tracker = Arc::new(ExecutionTracker::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&source) as Arc<dyn StatusSource>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let locks = Arc::new(LockManager::new(
            Arc::new(InMemoryLockStore::new(Arc::clone(&clock) as Arc<dyn Clock>)),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let guard = Arc::new(DuplicateGuard::new(locks));
        let reaper = StaleRunReaper::new(
            Arc::clone(&tracker),
            store,
            guard,
            Arc::clone(&clock) as Arc<dyn Clock>,
            ReaperConfig {
                timeout,
                ..ReaperConfig::default()
            },
        )
        .unwrap();
        Fixture {
            reaper,
            tracker,
            clock,
            source,
        }
    }

    #[tokio::test]
    async fn stale_started_run_is_failed_with_timeout_error() {
        let f = fixture(Duration::ZERO);
        f.tracker
            .register(
                "t1",
                "send_report",
                "reports",
                RegisterOptions {
                    initial_status: Some(TaskStatus::Started),
                    ..RegisterOptions::default()
                },
            )
            .await
            .unwrap();

        f.clock.advance(ChronoDuration::seconds(1));
        let report = f.reaper.run_once().await.unwrap();
        assert_eq!(report.reaped, 1);

        let record = f.tracker.get("t1").await.unwrap();
        assert_eq!(record.status, TaskStatus::Failure);
        assert!(record.error.as_deref().unwrap().contains("timeout"));
        assert!(record.finished_at.is_some());
    }

    #[tokio::test]
    async fn finished_run_with_stale_local_copy_is_recovered_not_reaped() {
        let f = fixture(Duration::from_secs(60));
        f.tracker
            .register(
                "t1",
                "send_report",
                "reports",
                RegisterOptions {
                    initial_status: Some(TaskStatus::Started),
                    ..RegisterOptions::default()
                },
            )
            .await
            .unwrap();
        // The run actually finished; only our record is behind.
        f.source
            .answers
            .lock()
            .unwrap()
            .insert("t1".to_owned(), RemoteStatus::of("SUCCESS"));

        f.clock.advance(ChronoDuration::minutes(5));
        let report = f.reaper.run_once().await.unwrap();
        assert_eq!(report.recovered, 1);
        assert_eq!(report.reaped, 0);

        let record = f.tracker.get("t1").await.unwrap();
        assert_eq!(record.status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn fresh_runs_are_left_alone() {
        let f = fixture(Duration::from_secs(600));
        f.tracker
            .register(
                "t1",
                "send_report",
                "reports",
                RegisterOptions {
                    initial_status: Some(TaskStatus::Started),
                    ..RegisterOptions::default()
                },
            )
            .await
            .unwrap();

        f.clock.advance(ChronoDuration::seconds(30));
        let report = f.reaper.run_once().await.unwrap();
        assert_eq!(report, ReapReport::default());

        let record = f.tracker.get("t1").await.unwrap();
        assert_eq!(record.status, TaskStatus::Started);
    }

    #[tokio::test]
    async fn terminal_records_are_never_touched() {
        let f = fixture(Duration::ZERO);
        f.tracker
            .register("t1", "send_report", "reports", RegisterOptions::default())
            .await
            .unwrap();
        f.tracker
            .update("t1", StatusUpdate::status(TaskStatus::Started))
            .await
            .unwrap();
        f.tracker
            .update("t1", StatusUpdate::status(TaskStatus::Success))
            .await
            .unwrap();

        f.clock.advance(ChronoDuration::hours(1));
        let report = f.reaper.run_once().await.unwrap();
        assert_eq!(report.reaped, 0);

        let record = f.tracker.get("t1").await.unwrap();
        assert_eq!(record.status, TaskStatus::Success);
    }
}
