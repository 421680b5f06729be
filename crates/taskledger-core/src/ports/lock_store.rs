//! LockStore port - atomic key/value primitive with expiry.
//!
//! Any shared cache offering atomic set-if-absent and compare-and-delete can
//! implement this (Redis SET NX PX / DEL-if-equal, for instance). v1 ships an
//! in-memory implementation; this trait is the seam for a real backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::LedgerError;

/// Single-key atomic operations over the shared lock store.
///
/// Contract:
/// - An entry whose `expires_at` has passed counts as absent for every
///   operation; the store evicts it regardless of the old holder's liveness.
///   TTL expiry is the sole crash-recovery mechanism for locks.
/// - `set_if_absent` is the sole arbiter of mutual exclusion: at most one
///   live value per key at any instant.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically store `token` at `key` unless a live value exists.
    /// Returns true when the value was stored.
    async fn set_if_absent(
        &self,
        key: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, LedgerError>;

    /// Atomically delete `key` only if its live value equals `token`.
    /// Returns true when a value was deleted.
    async fn delete_if_token(&self, key: &str, token: &str) -> Result<bool, LedgerError>;

    /// Current live value at `key`, if any. Advisory: may race with
    /// concurrent set/delete and must never gate correctness.
    async fn get_token(&self, key: &str) -> Result<Option<String>, LedgerError>;
}
