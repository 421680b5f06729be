//! In-memory lock store implementation.
//!
//! v1 backend for tests and single-process deployments. The mutex makes each
//! operation a single critical section, which is exactly the atomicity the
//! port demands; a shared cache (Redis SET NX / DEL-if-equal) slots in behind
//! the same trait for multi-process use.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::LedgerError;
use crate::ports::{Clock, LockStore};

struct Entry {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct InMemoryLockStore {
    state: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLockStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

/// Expired entries are evicted lazily, inside the same critical section as
/// the operation that found them, so they count as absent everywhere.
fn evict_if_expired(state: &mut HashMap<String, Entry>, key: &str, now: DateTime<Utc>) {
    if let Some(entry) = state.get(key)
        && entry.expires_at <= now
    {
        state.remove(key);
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().await;
        evict_if_expired(&mut state, key, self.clock.now());

        if state.contains_key(key) {
            return Ok(false);
        }
        state.insert(
            key.to_owned(),
            Entry {
                token: token.to_owned(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn delete_if_token(&self, key: &str, token: &str) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().await;
        evict_if_expired(&mut state, key, self.clock.now());

        match state.get(key) {
            Some(entry) if entry.token == token => {
                state.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_token(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let mut state = self.state.lock().await;
        evict_if_expired(&mut state, key, self.clock.now());
        Ok(state.get(key).map(|entry| entry.token.clone()))
    }
}
