//! In-process store used by tests and local runs.
//!
//! All schemas live behind one mutex, so every trait call is atomic with
//! respect to the others. Outages and slow round-trips can be injected to
//! exercise the timeout and fail-closed paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

use super::{
    AccountStore, BanStore, CounterStore, InsertOutcome, SessionStore, Store, StoreError,
};
use crate::identity::models::{Account, BanRecord, LoginIdentifier, NewBan, SessionRecord};

#[derive(Debug, Default)]
struct Inner {
    counters: HashMap<String, i64>,
    accounts: Vec<Account>,
    sessions: HashMap<String, SessionRecord>,
    bans: Vec<BanRecord>,
}

impl Inner {
    fn push_ban(&mut self, ban: &NewBan, now: DateTime<Utc>) -> BanRecord {
        let record = BanRecord {
            ban_id: Uuid::new_v4(),
            user_id: ban.user_id,
            banned_by: ban.banned_by,
            reason: ban.reason.clone(),
            ban_start: now,
            ban_end: ban.ban_end,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.bans.push(record.clone());
        record
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
    latency: Mutex<Option<Duration>>,
    ban_before_session: Mutex<Option<NewBan>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency` before it touches the data.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// Number of whitelist entries currently held, expired ones included.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.sessions.len())
    }

    /// Overwrite a counter, e.g. to seed it before a test burst.
    pub fn set_counter(&self, name: &str, value: i64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.counters.insert(name.to_string(), value);
        }
    }

    /// Place `ban` as part of the next session insert, just before the entry
    /// is written, as if an operator banned the user mid-login.
    pub fn ban_on_next_session_insert(&self, ban: NewBan) {
        if let Ok(mut guard) = self.ban_before_session.lock() {
            *guard = Some(ban);
        }
    }

    async fn enter(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let latency = self.latency.lock().ok().and_then(|guard| *guard);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.inner.lock().map_err(|_| StoreError::Unavailable)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment_counter(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let mut inner = self.enter().await?;
        Ok(inner.counters.get_mut(name).map(|value| {
            *value += 1;
            *value
        }))
    }

    async fn create_counter(&self, name: &str) -> Result<bool, StoreError> {
        let mut inner = self.enter().await?;
        if inner.counters.contains_key(name) {
            return Ok(false);
        }
        inner.counters.insert(name.to_string(), 1);
        Ok(true)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn account_exists(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let inner = self.enter().await?;
        Ok(inner
            .accounts
            .iter()
            .any(|account| account.username == username || account.email == email))
    }

    async fn insert_account(&self, account: &Account) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.enter().await?;
        let taken = inner.accounts.iter().any(|existing| {
            existing.id == account.id
                || existing.username == account.username
                || existing.email == account.email
        });
        if taken {
            return Ok(InsertOutcome::Conflict);
        }
        inner.accounts.push(account.clone());
        Ok(InsertOutcome::Created)
    }

    async fn find_account(
        &self,
        identifier: &LoginIdentifier,
    ) -> Result<Option<Account>, StoreError> {
        let inner = self.enter().await?;
        Ok(inner
            .accounts
            .iter()
            .find(|account| match identifier {
                LoginIdentifier::Id(id) => account.id == *id,
                LoginIdentifier::Email(email) => &account.email == email,
                LoginIdentifier::Username(username) => &account.username == username,
            })
            .cloned())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let pending = self.ban_before_session.lock().ok().and_then(|mut guard| guard.take());
        let mut inner = self.enter().await?;
        if let Some(ban) = pending {
            let now = Utc::now();
            let user_id = ban.user_id;
            inner.push_ban(&ban, now);
            inner.sessions.retain(|_, session| session.user_id != user_id);
        }
        inner
            .sessions
            .insert(record.token_id.clone(), record.clone());
        Ok(())
    }

    async fn find_session(
        &self,
        token_id: &str,
        user_id: i64,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let inner = self.enter().await?;
        Ok(inner
            .sessions
            .get(token_id)
            .filter(|record| record.user_id == user_id)
            .cloned())
    }

    async fn extend_session(
        &self,
        token_id: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.enter().await?;
        if let Some(record) = inner
            .sessions
            .get_mut(token_id)
            .filter(|record| record.user_id == user_id)
        {
            record.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete_session(&self, token_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.enter().await?;
        Ok(inner.sessions.remove(token_id).is_some())
    }

    async fn delete_user_sessions(&self, user_id: i64) -> Result<u64, StoreError> {
        let mut inner = self.enter().await?;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, record| record.user_id != user_id);
        Ok(u64::try_from(before - inner.sessions.len()).unwrap_or(u64::MAX))
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.enter().await?;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, record| record.expires_at > now);
        Ok(u64::try_from(before - inner.sessions.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl BanStore for MemoryStore {
    async fn insert_ban(&self, ban: &NewBan, now: DateTime<Utc>) -> Result<BanRecord, StoreError> {
        let mut inner = self.enter().await?;
        Ok(inner.push_ban(ban, now))
    }

    async fn find_active_ban(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<BanRecord>, StoreError> {
        let inner = self.enter().await?;
        Ok(inner
            .bans
            .iter()
            .filter(|ban| ban.user_id == user_id && ban.is_effective_at(now))
            .max_by_key(|ban| ban.ban_start)
            .cloned())
    }

    async fn deactivate_bans(&self, user_id: i64, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.enter().await?;
        let mut touched = 0;
        for ban in inner
            .bans
            .iter_mut()
            .filter(|ban| ban.user_id == user_id && ban.is_active)
        {
            ban.is_active = false;
            ban.updated_at = now;
            touched += 1;
        }
        Ok(touched)
    }

    async fn list_bans(&self, user_id: i64) -> Result<Vec<BanRecord>, StoreError> {
        let inner = self.enter().await?;
        let mut bans: Vec<BanRecord> = inner
            .bans
            .iter()
            .filter(|ban| ban.user_id == user_id)
            .cloned()
            .collect();
        bans.sort_by(|a, b| b.ban_start.cmp(&a.ban_start));
        Ok(bans)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.enter().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counter_create_then_increment() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        assert_eq!(store.increment_counter("user_id").await?, None);
        assert!(store.create_counter("user_id").await?);
        assert!(!store.create_counter("user_id").await?);
        assert_eq!(store.increment_counter("user_id").await?, Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn offline_store_rejects_calls() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.ping().await,
            Err(StoreError::Unavailable)
        ));
        store.set_offline(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn find_session_requires_matching_user() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let record = SessionRecord {
            token_id: "jti".to_string(),
            user_id: 7,
            expires_at: Utc::now(),
        };
        store.insert_session(&record).await?;
        assert_eq!(store.find_session("jti", 7).await?, Some(record));
        assert_eq!(store.find_session("jti", 8).await?, None);
        Ok(())
    }
}
