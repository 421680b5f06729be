//! RecordStore port - durable keyed execution records.
//!
//! The store is the source of truth for run lifecycles. Each method is a
//! single atomic operation; in particular `apply` is a whole
//! read-modify-write so concurrent updaters never interleave a partial
//! metadata merge. The store does not serialize logically-conflicting
//! updates beyond that: scalars are last-write-wins, metadata per-key-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ApplyOutcome, ExecutionRecord, LedgerError, StatusUpdate};
use crate::observability::StatusCounts;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Fails with [`LedgerError::AlreadyExists`] when
    /// the task_id is taken; the stored record is left unchanged.
    async fn insert(&self, record: ExecutionRecord) -> Result<(), LedgerError>;

    async fn get(&self, task_id: &str) -> Result<Option<ExecutionRecord>, LedgerError>;

    /// Atomically fold one merge-update into the record
    /// (see [`ExecutionRecord::apply`] for the transition rules).
    /// Returns None when the task_id is unknown.
    async fn apply(
        &self,
        task_id: &str,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<(ExecutionRecord, ApplyOutcome)>, LedgerError>;

    /// Ids of non-terminal records, oldest `created_at` first, bounded.
    async fn list_unfinished(&self, limit: usize) -> Result<Vec<String>, LedgerError>;

    /// Ids of non-terminal records whose `started_at` is set and older than
    /// `cutoff`, bounded. Backed by the (status, started_at) index.
    async fn list_stale(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError>;

    /// Ids of records with `created_at` older than `cutoff`, bounded.
    /// With `only_completed` only terminal records qualify; without it,
    /// ancient non-terminal orphans are included as well.
    async fn list_expired(
        &self,
        cutoff: DateTime<Utc>,
        only_completed: bool,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError>;

    /// Delete the given records, returning how many existed.
    async fn delete_many(&self, task_ids: &[String]) -> Result<usize, LedgerError>;

    /// Observability hook: record counts per status.
    async fn counts_by_status(&self) -> Result<StatusCounts, LedgerError>;
}
