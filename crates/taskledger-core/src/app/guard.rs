//! Duplicate guard: at most one concurrent run of a named unit of work.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::app::lock::{AcquireOutcome, LockKey, LockManager, LockToken};
use crate::domain::LedgerError;

/// Outcome of a guarded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<T> {
    /// The lock was acquired, the work ran, and the lock was released.
    /// Carries the work's own output untouched.
    Completed(T),

    /// The lock was held by another run; the work was never invoked.
    Skipped { key: String },
}

impl<T> GuardOutcome<T> {
    pub fn was_skipped(&self) -> bool {
        matches!(self, GuardOutcome::Skipped { .. })
    }

    pub fn into_inner(self) -> Option<T> {
        match self {
            GuardOutcome::Completed(value) => Some(value),
            GuardOutcome::Skipped { .. } => None,
        }
    }
}

/// Wraps arbitrary work with acquire / run / release.
///
/// Design:
/// - On Busy the work is short-circuited into [`GuardOutcome::Skipped`]
///   without being invoked.
/// - The guard only decides whether the work runs, never how it went: the
///   work's output (including an Err) passes through unmodified.
/// - Release happens on every completion path. A crash that never completes
///   the future is covered by the lock's TTL, same as a crashed process.
pub struct DuplicateGuard {
    locks: Arc<LockManager>,
}

impl DuplicateGuard {
    pub fn new(locks: Arc<LockManager>) -> Self {
        Self { locks }
    }

    pub async fn run<F, T>(
        &self,
        key: &LockKey,
        ttl: Duration,
        work: F,
    ) -> Result<GuardOutcome<T>, LedgerError>
    where
        F: Future<Output = T>,
    {
        let token: LockToken = match self.locks.acquire(key, ttl).await? {
            AcquireOutcome::Acquired(token) => token,
            AcquireOutcome::Busy => {
                warn!(key = %key, "run skipped: another run holds the lock");
                return Ok(GuardOutcome::Skipped {
                    key: key.as_str().to_owned(),
                });
            }
        };

        let output = work.await;

        // A release failure must not mask the work's result; the TTL will
        // reclaim the key if the delete never lands.
        if let Err(err) = self.locks.release(key, &token).await {
            warn!(key = %key, error = %err, "failed to release lock after run");
        }

        Ok(GuardOutcome::Completed(output))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::impls::InMemoryLockStore;
    use crate::ports::{Clock, FixedClock};

    fn guard() -> (DuplicateGuard, Arc<LockManager>) {
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock::at(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
        let store = Arc::new(InMemoryLockStore::new(Arc::clone(&clock)));
        let locks = Arc::new(LockManager::new(store, clock));
        (DuplicateGuard::new(Arc::clone(&locks)), locks)
    }

    #[tokio::test]
    async fn runs_work_and_releases() {
        let (guard, locks) = guard();
        let key = LockKey::new("job");

        let outcome = guard
            .run(&key, Duration::from_secs(60), async { 42 })
            .await
            .unwrap();

        assert_eq!(outcome.into_inner(), Some(42));
        assert!(!locks.is_locked(&key).await.unwrap());
    }

    #[tokio::test]
    async fn skips_without_invoking_when_lock_is_held() {
        let (guard, locks) = guard();
        let key = LockKey::new("job");

        let _held = match locks.acquire(&key, Duration::from_secs(60)).await.unwrap() {
            AcquireOutcome::Acquired(token) => token,
            AcquireOutcome::Busy => panic!("fresh key must acquire"),
        };

        let mut invoked = false;
        let outcome = guard
            .run(&key, Duration::from_secs(60), async {
                invoked = true;
            })
            .await
            .unwrap();

        assert!(outcome.was_skipped());
        assert!(!invoked);
        // The foreign lock stays in place.
        assert!(locks.is_locked(&key).await.unwrap());
    }

    #[tokio::test]
    async fn failing_work_still_releases_and_keeps_its_error() {
        let (guard, locks) = guard();
        let key = LockKey::new("job");

        let outcome = guard
            .run(&key, Duration::from_secs(60), async {
                Err::<(), _>("boom".to_string())
            })
            .await
            .unwrap();

        assert_eq!(outcome.into_inner(), Some(Err("boom".to_string())));
        assert!(!locks.is_locked(&key).await.unwrap());
    }
}
