//! Execution record: the durable per-run row and its merge-update rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{StatusUpdate, TaskStatus};

/// Durable record of one externally dispatched run.
///
/// Design:
/// - This is the single source of truth for a run's lifecycle. The external
///   scheduler's own bookkeeping is treated as unreliable; this row survives
///   worker crashes and scheduler silence.
/// - `task_id` comes from the dispatcher and is the primary key.
/// - All state transitions go through [`ExecutionRecord::apply`], so the
///   timestamp and terminal-stickiness rules live in exactly one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub task_id: String,

    /// Classification, immutable after registration.
    pub task_name: String,
    pub module: String,

    pub status: TaskStatus,

    pub created_at: DateTime<Utc>,

    /// Set on the first transition into Started, then never changed.
    pub started_at: Option<DateTime<Utc>>,

    /// Set on the first transition into a terminal status, then never changed.
    pub finished_at: Option<DateTime<Utc>>,

    /// Opaque payloads owned by the caller; normally only supplied together
    /// with a terminal status.
    pub result: Option<Value>,
    pub error: Option<String>,
    pub traceback: Option<String>,

    /// Open key/value map, merged per top-level key on every update.
    pub metadata: Map<String, Value>,

    /// Identity of the triggering actor, if known.
    pub created_by: Option<String>,
}

/// Result of applying one [`StatusUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The update was folded in. `previous` is the status before the call
    /// (possibly equal to the new one for idempotent re-application).
    Applied { previous: TaskStatus },

    /// The record is terminal and the update tried to move it elsewhere
    /// without the force flag. Nothing was changed. This is a data-quality
    /// warning, not a hard error.
    TerminalConflict {
        current: TaskStatus,
        attempted: TaskStatus,
    },
}

impl ExecutionRecord {
    /// A freshly registered record in Pending.
    pub fn new(
        task_id: impl Into<String>,
        task_name: impl Into<String>,
        module: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            task_name: task_name.into(),
            module: module.into(),
            status: TaskStatus::Pending,
            created_at: now,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            traceback: None,
            metadata: Map::new(),
            created_by: None,
        }
    }

    /// Fold one merge-update into the record.
    ///
    /// Rules (in order):
    /// - A terminal status is sticky: changing it requires `force`. An update
    ///   that re-sends the current terminal status is an idempotent no-op for
    ///   the status itself and still merges payloads.
    /// - `started_at` is set on the first Started, `finished_at` on the first
    ///   terminal status; both are write-once.
    /// - Payload fields overwrite when present; `metadata` merges per key.
    pub fn apply(&mut self, update: &StatusUpdate, now: DateTime<Utc>) -> ApplyOutcome {
        if self.status.is_terminal() && update.status != self.status && !update.force {
            return ApplyOutcome::TerminalConflict {
                current: self.status,
                attempted: update.status,
            };
        }

        let previous = self.status;
        self.status = update.status;

        if update.status == TaskStatus::Started && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if update.status.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(now);
        }

        if let Some(result) = &update.result {
            self.result = Some(result.clone());
        }
        if let Some(error) = &update.error {
            self.error = Some(error.clone());
        }
        if let Some(traceback) = &update.traceback {
            self.traceback = Some(traceback.clone());
        }
        if let Some(metadata) = &update.metadata {
            // Per-key wins: present keys overwrite, absent keys are preserved.
            for (key, value) in metadata {
                self.metadata.insert(key.clone(), value.clone());
            }
        }

        ApplyOutcome::Applied { previous }
    }
}
