//! In-process key/value cache with per-entry expiry.
//!
//! Expired entries are invisible to readers and dropped lazily; `purge_expired`
//! lets a background sweeper reclaim memory. The clock is Tokio's, so tests can
//! drive expiry with a paused runtime.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache").finish_non_exhaustive()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`, live for `ttl` from now. Returns `false`
    /// and stores nothing when `ttl` reaches past what the clock can represent.
    pub async fn set(&self, key: K, value: V, ttl: Duration) -> bool {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            return false;
        };
        self.entries
            .lock()
            .await
            .insert(key, Entry { value, expires_at });
        true
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key).map(|entry| entry.expires_at > now) {
            Some(true) => entries.get(key).map(|entry| entry.value.clone()),
            Some(false) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.get(key).await.is_some()
    }

    /// Remove `key`; returns the live value it held, if any.
    pub async fn remove(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .remove(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value)
    }

    /// Remove `key` only if it currently holds a live value satisfying `pred`.
    /// The check and the removal happen under one lock.
    pub async fn remove_if<F>(&self, key: &K, pred: F) -> bool
    where
        F: FnOnce(&V) -> bool,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let matched = entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > now && pred(&entry.value));
        if matched {
            entries.remove(key);
        }
        matched
    }

    /// Drop every expired entry; returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
