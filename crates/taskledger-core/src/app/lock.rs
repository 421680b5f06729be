//! Lock manager: mutual exclusion on top of the LockStore primitive.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tracing::{debug, info};
use ulid::Ulid;

use crate::domain::LedgerError;
use crate::ports::{Clock, LockStore};

const KEY_PREFIX: &str = "taskledger:lock";

/// Scope values longer than this are replaced by a digest so keys stay
/// bounded no matter what callers pass as a parameter.
const MAX_SCOPE_LEN: usize = 200;

/// Mutual-exclusion domain: a logical name, optionally scoped by a parameter
/// value so the same task can run concurrently for different scopes but not
/// twice for the same one (`send_report` vs `send_report:user=42`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey(String);

impl LockKey {
    pub fn new(name: &str) -> Self {
        Self(format!("{KEY_PREFIX}:{name}"))
    }

    pub fn scoped(name: &str, scope: &str) -> Self {
        if scope.len() > MAX_SCOPE_LEN {
            let digest = blake3::hash(scope.as_bytes()).to_hex();
            Self(format!("{KEY_PREFIX}:{name}:{}", &digest.as_str()[..16]))
        } else {
            Self(format!("{KEY_PREFIX}:{name}:{scope}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque value unique to one acquire attempt. Release is only honored for
/// the matching token, so a holder cannot free a lock it already lost to
/// expiry and re-acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of one acquire attempt. Busy means "skip this run", not an error.
#[derive(Debug)]
pub enum AcquireOutcome {
    Acquired(LockToken),
    Busy,
}

/// Builds mutual exclusion semantics on top of the [`LockStore`] primitive.
///
/// Design:
/// - `acquire` makes exactly one set-if-absent attempt and never blocks or
///   retries; callers treat Busy as "skip this run", not "wait for a turn".
/// - Every lock carries a TTL. Choosing it is the caller's tradeoff: too
///   short risks a duplicate run when the work is slow, too long blocks a
///   legitimate re-run after a crash until expiry.
pub struct LockManager {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// One atomic set-if-absent attempt with expiry `ttl`.
    pub async fn acquire(
        &self,
        key: &LockKey,
        ttl: Duration,
    ) -> Result<AcquireOutcome, LedgerError> {
        let ttl = ChronoDuration::from_std(ttl)
            .map_err(|err| LedgerError::Config(format!("lock ttl out of range: {err}")))?;
        let token = Ulid::new().to_string();
        let expires_at = self.clock.now() + ttl;

        if self
            .store
            .set_if_absent(key.as_str(), &token, expires_at)
            .await?
        {
            info!(key = %key, %expires_at, "acquired lock");
            Ok(AcquireOutcome::Acquired(LockToken(token)))
        } else {
            debug!(key = %key, "lock already held");
            Ok(AcquireOutcome::Busy)
        }
    }

    /// Compare-and-delete release. A foreign or already-expired token is a
    /// no-op, not an error: the lock either expired on its own or belongs to
    /// a newer holder, and both are fine to leave alone.
    pub async fn release(&self, key: &LockKey, token: &LockToken) -> Result<(), LedgerError> {
        if self.store.delete_if_token(key.as_str(), token.as_str()).await? {
            info!(key = %key, "released lock");
        } else {
            debug!(key = %key, "release skipped: lock expired or owned by another holder");
        }
        Ok(())
    }

    /// Point-in-time check. Advisory only: the answer can be stale by the
    /// time the caller acts on it.
    pub async fn is_locked(&self, key: &LockKey) -> Result<bool, LedgerError> {
        Ok(self.store.get_token(key.as_str()).await?.is_some())
    }
}
