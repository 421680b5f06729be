//! Reconciler: fold the external scheduler's view into the record store.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app::config::ReconcilerConfig;
use crate::app::guard::DuplicateGuard;
use crate::app::lock::LockKey;
use crate::app::tracker::ExecutionTracker;
use crate::domain::LedgerError;
use crate::ports::RecordStore;

/// Counts from one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Periodically (or on demand) pulls authoritative statuses for every
/// non-terminal record and folds them in via the tracker.
///
/// Partial-failure isolation: one record failing to sync (network error,
/// unknown status string) logs and moves on; it never aborts the batch.
pub struct Reconciler {
    tracker: Arc<ExecutionTracker>,
    store: Arc<dyn RecordStore>,
    guard: Arc<DuplicateGuard>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        tracker: Arc<ExecutionTracker>,
        store: Arc<dyn RecordStore>,
        guard: Arc<DuplicateGuard>,
        config: ReconcilerConfig,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            tracker,
            store,
            guard,
            config,
        })
    }

    /// One pass over the non-terminal backlog, oldest first.
    pub async fn sync_all_unfinished(&self) -> Result<ReconcileReport, LedgerError> {
        let ids = self.store.list_unfinished(self.config.batch_limit).await?;
        let mut report = ReconcileReport {
            scanned: ids.len(),
            ..ReconcileReport::default()
        };

        for task_id in ids {
            match self.tracker.sync_from_source(&task_id).await {
                Ok(_) => report.synced += 1,
                Err(err) => {
                    // One bad record must not sink the batch.
                    warn!(task_id = %task_id, error = %err, "reconcile failed for execution");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            synced = report.synced,
            failed = report.failed,
            "reconcile pass finished"
        );
        Ok(report)
    }

    /// Periodic loop. Each tick runs one guarded pass; a tick whose lock is
    /// still held by the previous pass is skipped.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let key = LockKey::new("reconcile_unfinished");
        info!(interval_secs = self.config.interval.as_secs(), "reconciler loop started");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("reconciler loop shutting down");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.interval) => {
                    let outcome = self
                        .guard
                        .run(&key, self.config.lock_ttl, self.sync_all_unfinished())
                        .await;
                    match outcome {
                        Ok(outcome) if outcome.was_skipped() => {
                            debug!("reconcile tick skipped: previous pass still running");
                        }
                        Ok(_) => {}
                        Err(err) => warn!(error = %err, "reconcile pass errored"),
                    }
                }
            }
        }
    }
}
