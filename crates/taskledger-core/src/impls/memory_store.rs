//! In-memory record store implementation.
//!
//! Mirrors what a real table with (status, started_at) and
//! (status, created_at) indexes would answer; scans sort oldest-first so
//! batch limits behave the same as a SQL `ORDER BY ... LIMIT`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{ApplyOutcome, ExecutionRecord, LedgerError, StatusUpdate};
use crate::observability::StatusCounts;
use crate::ports::RecordStore;

#[derive(Default)]
struct State {
    records: HashMap<String, ExecutionRecord>,
}

impl State {
    fn sorted_ids<F>(&self, filter: F, limit: usize) -> Vec<String>
    where
        F: Fn(&ExecutionRecord) -> bool,
    {
        let mut matches: Vec<&ExecutionRecord> =
            self.records.values().filter(|r| filter(r)).collect();
        matches.sort_by_key(|r| r.created_at);
        matches
            .into_iter()
            .take(limit)
            .map(|r| r.task_id.clone())
            .collect()
    }
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    state: Mutex<State>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: ExecutionRecord) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if state.records.contains_key(&record.task_id) {
            return Err(LedgerError::AlreadyExists(record.task_id));
        }
        state.records.insert(record.task_id.clone(), record);
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<ExecutionRecord>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.records.get(task_id).cloned())
    }

    async fn apply(
        &self,
        task_id: &str,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<(ExecutionRecord, ApplyOutcome)>, LedgerError> {
        let mut state = self.state.lock().await;
        let Some(record) = state.records.get_mut(task_id) else {
            return Ok(None);
        };
        // Whole read-modify-write under one lock: no interleaved partial
        // metadata merges.
        let outcome = record.apply(update, now);
        Ok(Some((record.clone(), outcome)))
    }

    async fn list_unfinished(&self, limit: usize) -> Result<Vec<String>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.sorted_ids(|r| !r.status.is_terminal(), limit))
    }

    async fn list_stale(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.sorted_ids(
            |r| !r.status.is_terminal() && r.started_at.is_some_and(|t| t < cutoff),
            limit,
        ))
    }

    async fn list_expired(
        &self,
        cutoff: DateTime<Utc>,
        only_completed: bool,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.sorted_ids(
            |r| r.created_at < cutoff && (r.status.is_terminal() || !only_completed),
            limit,
        ))
    }

    async fn delete_many(&self, task_ids: &[String]) -> Result<usize, LedgerError> {
        let mut state = self.state.lock().await;
        let mut deleted = 0;
        for task_id in task_ids {
            if state.records.remove(task_id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn counts_by_status(&self) -> Result<StatusCounts, LedgerError> {
        let state = self.state.lock().await;
        let mut counts = StatusCounts::default();
        for record in state.records.values() {
            counts.bump(record.status);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::domain::TaskStatus;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn record(id: &str, created_at: DateTime<Utc>) -> ExecutionRecord {
        ExecutionRecord::new(id, "send_report", "reports", created_at)
    }

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let store = InMemoryRecordStore::new();
        store.insert(record("t1", t0())).await.unwrap();

        let err = store.insert(record("t1", t0())).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn apply_returns_none_for_unknown_id() {
        let store = InMemoryRecordStore::new();
        let out = store
            .apply("ghost", &StatusUpdate::status(TaskStatus::Started), t0())
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn list_unfinished_is_oldest_first_and_bounded() {
        let store = InMemoryRecordStore::new();
        store.insert(record("b", t0() + Duration::minutes(2))).await.unwrap();
        store.insert(record("a", t0())).await.unwrap();
        store.insert(record("c", t0() + Duration::minutes(4))).await.unwrap();

        let ids = store.list_unfinished(2).await.unwrap();
        assert_eq!(ids, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[tokio::test]
    async fn list_stale_ignores_never_started_records() {
        let store = InMemoryRecordStore::new();
        store.insert(record("pending", t0())).await.unwrap();

        let mut started = record("started", t0());
        started.apply(&StatusUpdate::status(TaskStatus::Started), t0());
        store.insert(started).await.unwrap();

        let ids = store
            .list_stale(t0() + Duration::minutes(1), 100)
            .await
            .unwrap();
        assert_eq!(ids, vec!["started".to_owned()]);
    }

    #[tokio::test]
    async fn counts_by_status_covers_all_records() {
        let store = InMemoryRecordStore::new();
        store.insert(record("p", t0())).await.unwrap();

        let mut done = record("s", t0());
        done.apply(&StatusUpdate::status(TaskStatus::Success), t0());
        store.insert(done).await.unwrap();

        let counts = store.counts_by_status().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.success, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn delete_many_reports_how_many_existed() {
        let store = InMemoryRecordStore::new();
        store.insert(record("t1", t0())).await.unwrap();

        let deleted = store
            .delete_many(&["t1".to_owned(), "ghost".to_owned()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get("t1").await.unwrap().is_none());
    }
}
