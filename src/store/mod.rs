//! Persistence seams for the identity core.
//!
//! Each sub-component owns one schema in the backing store and reaches it only
//! through the trait below that describes it. Handles are injected as
//! `Arc<dyn ...>` so the same core runs against Postgres in production and the
//! in-memory store in tests.
//!
//! Every call made by the core goes through [`bounded`], so a stalled store
//! surfaces as [`StoreError::Timeout`] instead of hanging the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{future::Future, time::Duration};

use crate::identity::models::{Account, BanRecord, LoginIdentifier, NewBan, SessionRecord};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Default upper bound for a single store round-trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store operation `{operation}` timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },
    #[error("store unavailable")]
    Unavailable,
    #[error("store backend error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Result of inserting a new account row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    Conflict,
}

/// Named monotonic counters (`counters` schema).
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment an existing counter and return the new value.
    /// Returns `None` when the counter row does not exist yet.
    async fn increment_counter(&self, name: &str) -> Result<Option<i64>, StoreError>;

    /// Create the counter with value 1.
    /// Returns `false` when another writer created it first.
    async fn create_counter(&self, name: &str) -> Result<bool, StoreError>;
}

/// Account directory (`users` schema).
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// True when any account already uses the username or the email.
    async fn account_exists(&self, username: &str, email: &str) -> Result<bool, StoreError>;

    async fn insert_account(&self, account: &Account) -> Result<InsertOutcome, StoreError>;

    async fn find_account(
        &self,
        identifier: &LoginIdentifier,
    ) -> Result<Option<Account>, StoreError>;
}

/// Session whitelist (`user_sessions` schema).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError>;

    async fn find_session(
        &self,
        token_id: &str,
        user_id: i64,
    ) -> Result<Option<SessionRecord>, StoreError>;

    async fn extend_session(
        &self,
        token_id: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Returns `true` when a record was removed.
    async fn delete_session(&self, token_id: &str) -> Result<bool, StoreError>;

    /// Returns the number of removed records.
    async fn delete_user_sessions(&self, user_id: i64) -> Result<u64, StoreError>;

    /// Passive expiry: drop every record whose `expires_at` is not after `now`.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Suspension history (`user_bans` schema).
#[async_trait]
pub trait BanStore: Send + Sync {
    async fn insert_ban(&self, ban: &NewBan, now: DateTime<Utc>) -> Result<BanRecord, StoreError>;

    /// Most recently started active ban whose end is unset or after `now`.
    async fn find_active_ban(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<BanRecord>, StoreError>;

    /// Deactivate every active ban of the user; returns the number touched.
    async fn deactivate_bans(&self, user_id: i64, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Every ban of the user, newest first.
    async fn list_bans(&self, user_id: i64) -> Result<Vec<BanRecord>, StoreError>;
}

/// A backing store carrying every schema used by the core.
#[async_trait]
pub trait Store: CounterStore + AccountStore + SessionStore + BanStore {
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Run a store future under a deadline.
///
/// # Errors
/// Returns `StoreError::Timeout` when `limit` elapses first, otherwise the
/// future's own result.
pub async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { operation, limit }),
    }
}
