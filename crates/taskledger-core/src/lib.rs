//! taskledger-core
//!
//! Side-channel execution tracking for work dispatched to an external
//! scheduler whose status reporting is unreliable. Two guarantees:
//! at most one concurrent run per lock key, and a durable record of every
//! run's lifecycle that converges despite missed or partial status reports.
//!
//! # Module layout
//! - **domain**: status machine, execution records, merge-updates, errors
//! - **ports**: abstraction seams (LockStore, RecordStore, StatusSource, Clock)
//! - **app**: services (LockManager, DuplicateGuard, ExecutionTracker,
//!   Reconciler, StaleRunReaper, RetentionCleaner)
//! - **impls**: in-memory port implementations for development and tests
//!
//! Retries are the caller's responsibility: this crate records and fences
//! runs, it never re-invokes work.

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{
    AcquireOutcome, DuplicateGuard, ExecutionTracker, GuardOutcome, LockKey, LockManager,
    Reconciler, RegisterOptions, RetentionCleaner, StaleRunReaper,
};
pub use domain::{ExecutionRecord, LedgerError, StatusUpdate, TaskStatus};
