//! Application services: lock manager, duplicate guard, tracker, janitors.

pub mod cleaner;
pub mod config;
pub mod guard;
pub mod lock;
pub mod reaper;
pub mod reconciler;
pub mod tracker;

pub use cleaner::{CleanReport, RetentionCleaner};
pub use config::{CleanerConfig, ReaperConfig, ReconcilerConfig};
pub use guard::{DuplicateGuard, GuardOutcome};
pub use lock::{AcquireOutcome, LockKey, LockManager, LockToken};
pub use reaper::{ReapReport, StaleRunReaper};
pub use reconciler::{ReconcileReport, Reconciler};
pub use tracker::{ExecutionTracker, RegisterOptions};
