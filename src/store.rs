//! Per-user state persistence.
//!
//! `PgStateStore` keeps one JSONB blob per user key in the `user_states`
//! table. Reads treat a missing row the same as an unavailable database:
//! the caller gets the empty state and the turn keeps going. Writes retry a
//! bounded number of times and then give up with a log line.
//!
//! `MemoryStateStore` backs the service when no database is configured and
//! doubles as the store used by the engine tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};

use crate::services::StateStore;
use crate::types::UserState;

/// Bounded retry with a fixed, injectable backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn fixed(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// No sleeping between attempts. Used by tests.
    pub fn immediate(attempts: u32) -> Self {
        Self::fixed(attempts, Duration::ZERO)
    }

    pub async fn run<T, E, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts => {
                    tracing::debug!(%err, attempt, "transient failure, retrying");
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

pub struct PgStateStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgStateStore {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn get(&self, user_key: &str) -> UserState {
        let row = sqlx::query("SELECT state FROM user_states WHERE user_key = $1")
            .bind(user_key)
            .fetch_optional(&self.pool)
            .await;
        match row {
            Ok(Some(row)) => {
                let blob: serde_json::Value = row.get("state");
                serde_json::from_value(blob).unwrap_or_else(|err| {
                    tracing::warn!(%err, user_key, "stored state blob did not parse, treating as empty");
                    UserState::default()
                })
            }
            Ok(None) => UserState::default(),
            Err(err) => {
                tracing::warn!(%err, user_key, "state read failed, treating as empty");
                UserState::default()
            }
        }
    }

    async fn put(&self, user_key: &str, state: &UserState) {
        let mut stamped = state.clone();
        let now = Utc::now().to_rfc3339();
        stamped.last_updated = Some(now.clone());

        let blob = match serde_json::to_value(&stamped) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%err, user_key, "state did not serialize, skipping write");
                return;
            }
        };

        let result = self
            .retry
            .run(|| async {
                sqlx::query(
                    "INSERT INTO user_states (user_key, state, updated_at) VALUES ($1, $2, $3) \
                     ON CONFLICT (user_key) DO UPDATE SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at",
                )
                .bind(user_key)
                .bind(&blob)
                .bind(&now)
                .execute(&self.pool)
                .await
                .map(|_| ())
            })
            .await;

        if let Err(err) = result {
            tracing::warn!(%err, user_key, "state write failed after retries, dropping update");
        }
    }
}

/// In-process store used when no database is configured, and by tests.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    states: Arc<Mutex<HashMap<String, UserState>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// What is currently persisted for a key, if anything.
    pub fn snapshot(&self, user_key: &str) -> Option<UserState> {
        self.states.lock().unwrap().get(user_key).cloned()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, user_key: &str) -> UserState {
        self.states
            .lock()
            .unwrap()
            .get(user_key)
            .cloned()
            .unwrap_or_default()
    }

    async fn put(&self, user_key: &str, state: &UserState) {
        let mut stamped = state.clone();
        stamped.last_updated = Some(Utc::now().to_rfc3339());
        self.states
            .lock()
            .unwrap()
            .insert(user_key.to_string(), stamped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let result: Result<u32, String> = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(format!("transient {n}"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_configured_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let result: Result<(), String> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("still down".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn memory_store_stamps_last_updated() {
        let store = MemoryStateStore::new();
        store.put("user-1", &UserState::awaiting_interests()).await;

        let stored = store.snapshot("user-1").unwrap();
        assert!(stored.last_updated.is_some());
        assert_eq!(stored.phase, crate::types::ConversationPhase::AwaitingInterests);
    }

    #[tokio::test]
    async fn memory_store_missing_key_is_empty_state() {
        let store = MemoryStateStore::new();
        assert_eq!(store.get("nobody").await, UserState::default());
    }
}
