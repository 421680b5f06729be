//! End-to-end walkthrough on the in-memory backends: register a run, guard
//! it against duplicates, reconcile a silent run, reap a stuck one, clean up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use taskledger_core::app::{
    CleanerConfig, DuplicateGuard, ExecutionTracker, LockKey, LockManager, ReaperConfig,
    Reconciler, ReconcilerConfig, RegisterOptions, RetentionCleaner, StaleRunReaper,
};
use taskledger_core::domain::{LedgerError, StatusUpdate, TaskStatus};
use taskledger_core::impls::{InMemoryLockStore, InMemoryRecordStore};
use taskledger_core::ports::{Clock, RecordStore, RemoteStatus, StatusSource, SystemClock};

/// Scripted stand-in for the external scheduler's status lookup.
struct ScriptedScheduler {
    answers: Mutex<HashMap<String, RemoteStatus>>,
}

#[async_trait]
impl StatusSource for ScriptedScheduler {
    async fn fetch(&self, task_id: &str) -> Result<Option<RemoteStatus>, LedgerError> {
        Ok(self.answers.lock().unwrap().get(task_id).cloned())
    }
}

#[tokio::main]
async fn main() -> Result<(), LedgerError> {
    tracing_subscriber::fmt::init();

    // (A) Wire the components together. Every store handle is injected;
    // nothing is a global.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let lock_store = Arc::new(InMemoryLockStore::new(Arc::clone(&clock)));
    let record_store = Arc::new(InMemoryRecordStore::new());
    let scheduler = Arc::new(ScriptedScheduler {
        answers: Mutex::new(HashMap::from([(
            "report-2".to_owned(),
            RemoteStatus {
                status: "SUCCESS".into(),
                result: Some(json!({"rows": 250})),
                error: None,
                traceback: None,
            },
        )])),
    });

    let locks = Arc::new(LockManager::new(lock_store, Arc::clone(&clock)));
    let guard = Arc::new(DuplicateGuard::new(Arc::clone(&locks)));
    let tracker = Arc::new(ExecutionTracker::new(
        Arc::clone(&record_store) as Arc<dyn RecordStore>,
        Arc::clone(&scheduler) as Arc<dyn StatusSource>,
        Arc::clone(&clock),
    ));

    // (B) Normal path: register at dispatch time, then run the work under
    // the duplicate guard. A second run on the same key gets skipped.
    tracker
        .register("report-1", "send_report", "reports", RegisterOptions::default())
        .await?;

    let key = LockKey::scoped("send_report", "user=42");
    let mut runs = Vec::new();
    for n in 0..2 {
        let guard = Arc::clone(&guard);
        let tracker = Arc::clone(&tracker);
        let key = key.clone();
        runs.push(tokio::spawn(async move {
            guard
                .run(&key, Duration::from_secs(60), async {
                    tracker
                        .update("report-1", StatusUpdate::status(TaskStatus::Started))
                        .await?;
                    println!("run {n}: doing the actual work");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    tracker
                        .update(
                            "report-1",
                            StatusUpdate::status(TaskStatus::Success)
                                .with_result(json!({"rows": 120})),
                        )
                        .await
                })
                .await
        }));
    }
    for run in runs {
        let outcome = run.await.expect("guarded run panicked")?;
        println!("guarded run skipped: {}", outcome.was_skipped());
    }

    // (C) A run that never reported: the reconciler pulls the scheduler's
    // answer and folds it into the record.
    tracker
        .register("report-2", "send_report", "reports", RegisterOptions::default())
        .await?;
    let reconciler = Reconciler::new(
        Arc::clone(&tracker),
        Arc::clone(&record_store) as Arc<dyn RecordStore>,
        Arc::clone(&guard),
        ReconcilerConfig::default(),
    )?;
    let report = reconciler.sync_all_unfinished().await?;
    println!("reconcile: {report:?}");

    // (D) A run that started and went silent, with a scheduler that knows
    // nothing either: the reaper times it out.
    tracker
        .register(
            "report-3",
            "send_report",
            "reports",
            RegisterOptions {
                initial_status: Some(TaskStatus::Started),
                ..RegisterOptions::default()
            },
        )
        .await?;
    let reaper = StaleRunReaper::new(
        Arc::clone(&tracker),
        Arc::clone(&record_store) as Arc<dyn RecordStore>,
        Arc::clone(&guard),
        Arc::clone(&clock),
        ReaperConfig {
            timeout: Duration::ZERO,
            ..ReaperConfig::default()
        },
    )?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let report = reaper.run_once().await?;
    println!("reaper: {report:?}");
    let reaped = tracker.get("report-3").await?;
    println!("report-3: status={} error={:?}", reaped.status, reaped.error);

    // (E) Retention cleanup: with retention zero, every terminal record goes.
    let cleaner = RetentionCleaner::new(
        Arc::clone(&record_store) as Arc<dyn RecordStore>,
        Arc::clone(&guard),
        Arc::clone(&clock),
        CleanerConfig {
            retention: Duration::ZERO,
            ..CleanerConfig::default()
        },
    )?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let report = cleaner.run_once().await?;
    println!("cleaner: {report:?}");

    let counts = record_store.counts_by_status().await?;
    println!("remaining: {counts:?}");
    Ok(())
}
