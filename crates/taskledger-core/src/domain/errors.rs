//! Error types.
//!
//! LockBusy is deliberately absent: a held lock is a normal control-flow
//! outcome (`AcquireOutcome::Busy`), not an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Duplicate registration for the same task_id. Surfaced to the caller so
    /// "duplicate dispatch" stays distinguishable from storage failure.
    #[error("execution already registered task_id={0}")]
    AlreadyExists(String),

    /// Update or lookup on an unknown task_id.
    #[error("execution not found task_id={0}")]
    NotFound(String),

    /// The external scheduler reported a status string outside the six
    /// canonical values. Logged and skipped by the reconciler, never fatal
    /// to a batch.
    #[error("unknown external status {status:?} task_id={task_id}")]
    UnknownExternalStatus { task_id: String, status: String },

    /// Transient I/O failure in a backing store. Safe to retry with backoff
    /// at the caller or janitor level.
    #[error("store failure: {0}")]
    Store(String),

    /// Invalid configuration. The only error allowed to fail fast at startup.
    #[error("invalid configuration: {0}")]
    Config(String),
}
