//! Execution tracker: register, update, look up, and sync tracked runs.
//!
//! This is the caller-facing core of the crate. Dispatch code calls
//! [`ExecutionTracker::register`] right after handing the work to the
//! external scheduler; the work itself (or the reconciler on its behalf)
//! pushes progress through [`ExecutionTracker::update`].

use std::sync::Arc;

use serde_json::Map;
use tracing::{debug, info, warn};

use crate::domain::{
    ApplyOutcome, ExecutionRecord, LedgerError, StatusUpdate, TaskStatus,
};
use crate::ports::{Clock, RecordStore, StatusSource};

/// Optional fields accepted at registration time.
#[derive(Debug, Default, Clone)]
pub struct RegisterOptions {
    pub created_by: Option<String>,
    pub metadata: Option<Map<String, serde_json::Value>>,

    /// Periodic jobs have no dispatcher to register them ahead of time; they
    /// register themselves as already Started in one call, which also sets
    /// `started_at`.
    pub initial_status: Option<TaskStatus>,
}

pub struct ExecutionTracker {
    store: Arc<dyn RecordStore>,
    source: Arc<dyn StatusSource>,
    clock: Arc<dyn Clock>,
}

impl ExecutionTracker {
    pub fn new(
        store: Arc<dyn RecordStore>,
        source: Arc<dyn StatusSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            source,
            clock,
        }
    }

    /// Register one run at dispatch time.
    ///
    /// `task_id` must be the unique id issued by the external scheduler.
    /// Duplicate registration fails with [`LedgerError::AlreadyExists`] and
    /// leaves the stored record untouched.
    pub async fn register(
        &self,
        task_id: &str,
        task_name: &str,
        module: &str,
        options: RegisterOptions,
    ) -> Result<ExecutionRecord, LedgerError> {
        let now = self.clock.now();
        let mut record = ExecutionRecord::new(task_id, task_name, module, now);
        record.created_by = options.created_by;
        record.metadata = options.metadata.unwrap_or_default();

        if let Some(status) = options.initial_status {
            // Fresh record is Pending, so this can never hit a terminal
            // conflict; it reuses the transition rules for started_at.
            record.apply(&StatusUpdate::status(status), now);
        }

        self.store.insert(record.clone()).await?;
        info!(task_id, task_name, module, status = %record.status, "registered execution");
        Ok(record)
    }

    /// Fold one merge-update into the record.
    ///
    /// Safe to call repeatedly while the run is non-terminal (progress
    /// updates). A conflicting write against a terminal status is logged as
    /// a data-quality warning and ignored; pass [`StatusUpdate::forced`] to
    /// override deliberately.
    pub async fn update(
        &self,
        task_id: &str,
        update: StatusUpdate,
    ) -> Result<ExecutionRecord, LedgerError> {
        let now = self.clock.now();
        let Some((record, outcome)) = self.store.apply(task_id, &update, now).await? else {
            warn!(task_id, "update for unknown execution");
            return Err(LedgerError::NotFound(task_id.to_owned()));
        };

        match outcome {
            ApplyOutcome::Applied { previous } if previous != record.status => {
                info!(
                    task_id,
                    task_name = %record.task_name,
                    from = %previous,
                    to = %record.status,
                    "execution status changed"
                );
            }
            ApplyOutcome::Applied { .. } => {}
            ApplyOutcome::TerminalConflict { current, attempted } => {
                warn!(
                    task_id,
                    current = %current,
                    attempted = %attempted,
                    "refusing to overwrite terminal status without force"
                );
            }
        }
        Ok(record)
    }

    pub async fn get(&self, task_id: &str) -> Result<ExecutionRecord, LedgerError> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(task_id.to_owned()))
    }

    /// Refresh from the external scheduler, then return the record.
    pub async fn get_synced(&self, task_id: &str) -> Result<ExecutionRecord, LedgerError> {
        self.sync_from_source(task_id).await
    }

    /// Pull the authoritative status for one run and fold it in.
    ///
    /// Used when the work never pushed its own status (crashed worker,
    /// legacy task). Idempotent: re-applying the same external status leaves
    /// the record unchanged. Payloads are only carried over for terminal
    /// statuses, since only terminal writers are supposed to supply them.
    pub async fn sync_from_source(&self, task_id: &str) -> Result<ExecutionRecord, LedgerError> {
        let current = self.get(task_id).await?;

        let Some(remote) = self.source.fetch(task_id).await? else {
            debug!(task_id, "scheduler has no status for execution");
            return Ok(current);
        };

        let Some(status) = TaskStatus::parse(&remote.status) else {
            return Err(LedgerError::UnknownExternalStatus {
                task_id: task_id.to_owned(),
                status: remote.status,
            });
        };

        if status == current.status {
            debug!(task_id, status = %status, "external status matches record");
            return Ok(current);
        }

        let mut update = StatusUpdate::status(status);
        if status.is_terminal() {
            update.result = remote.result;
            update.error = remote.error;
            update.traceback = remote.traceback;
        }
        self.update(task_id, update).await
    }
}
