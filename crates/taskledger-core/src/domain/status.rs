//! Execution status machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of one tracked execution.
///
/// State transitions:
/// - Pending -> Started -> Success | Failure | Revoked
/// - Started -> Retry -> Started (external scheduler re-runs the work)
/// - any non-terminal -> Failure (reaper timeout)
///
/// Success, Failure and Revoked are terminal: the janitor processes never
/// move a record out of them. Revoked is observational only; cancellation is
/// initiated by the external scheduler, never by this crate.
///
/// Design note: Using a closed enum ensures exhaustive matching; the external
/// scheduler's status strings are parsed at the reconciliation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Registered, not yet picked up by a worker.
    Pending,

    /// Currently being executed.
    Started,

    /// Finished successfully.
    Success,

    /// Failed, including administrative timeout failures from the reaper.
    Failure,

    /// Waiting for the external scheduler to re-run it.
    Retry,

    /// Cancelled by the external scheduler.
    Revoked,
}

impl TaskStatus {
    /// Is this a terminal status (no further automatic transition)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Revoked
        )
    }

    /// Is the work considered in flight (started or awaiting a retry)?
    pub fn is_running(self) -> bool {
        matches!(self, TaskStatus::Started | TaskStatus::Retry)
    }

    /// Canonical wire form, matching what the external scheduler reports.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Started => "STARTED",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Retry => "RETRY",
            TaskStatus::Revoked => "REVOKED",
        }
    }

    /// Parse one of the six canonical status strings.
    ///
    /// Returns None for anything else; the reconciler logs and skips those
    /// rather than guessing.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "STARTED" => Some(TaskStatus::Started),
            "SUCCESS" => Some(TaskStatus::Success),
            "FAILURE" => Some(TaskStatus::Failure),
            "RETRY" => Some(TaskStatus::Retry),
            "REVOKED" => Some(TaskStatus::Revoked),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::parse(s).ok_or_else(|| format!("unknown task status: {s}"))
    }
}
