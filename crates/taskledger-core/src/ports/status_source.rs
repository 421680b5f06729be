//! StatusSource port - the external scheduler's authoritative status lookup.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::LedgerError;

/// Status as reported by the external scheduler.
///
/// `status` stays a raw string here: the scheduler is outside our control and
/// may report values we do not recognize. Parsing into [`crate::domain::TaskStatus`]
/// happens at the reconciliation boundary, where unknown values are logged
/// and skipped.
#[derive(Debug, Clone)]
pub struct RemoteStatus {
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub traceback: Option<String>,
}

impl RemoteStatus {
    pub fn of(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            result: None,
            error: None,
            traceback: None,
        }
    }
}

/// Lookup by dispatch id against the external scheduler.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Current status for `task_id`, or None when the scheduler has no
    /// knowledge of the id (e.g. its own result store already expired it).
    async fn fetch(&self, task_id: &str) -> Result<Option<RemoteStatus>, LedgerError>;
}
