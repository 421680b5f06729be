//! Merge-update payload for execution records.

use serde_json::{Map, Value};

use super::TaskStatus;

/// One merge-update against an [`super::ExecutionRecord`].
///
/// Design:
/// - `result`/`error`/`traceback` overwrite when present, stay untouched when
///   absent. They are opaque to this crate; callers own their shape.
/// - `metadata` is merged key-by-key into the stored map, never replaced
///   wholesale. Nested values under the same key are replaced, not merged.
/// - `force` is the explicit override for re-writing a terminal status.
///   The reconciler and the janitors never set it.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub traceback: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    pub force: bool,
}

impl StatusUpdate {
    /// A bare status transition with no payloads.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status,
            result: None,
            error: None,
            traceback: None,
            metadata: None,
            force: false,
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Allow overwriting an already-terminal status.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}
