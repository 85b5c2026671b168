//! Rate limiting primitives for one-time code requests.
//!
//! A request first reserves its email and client address. The reservation
//! already blocks other requests for either key, so two concurrent requests
//! can never both get through. Once delivery succeeded the reservation is
//! committed into a full cooldown; a failed delivery releases it.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{cache::TtlCache, config::MAX_TTL_SECONDS};

/// Markers taken by one successful [`RateLimiter::reserve`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reservation(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed(Reservation),
    Limited,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check both keys and, when neither is held, hold them in the same step.
    async fn reserve(&self, email: &str, ip: Option<&str>) -> RateLimitDecision;
    /// Start the cooldown for both keys after a successful send.
    async fn commit(&self, reservation: Reservation, email: &str, ip: Option<&str>);
    /// Drop the markers of a reservation whose send failed.
    async fn release(&self, reservation: Reservation, email: &str, ip: Option<&str>);
    /// Drop expired markers; returns how many were dropped.
    async fn purge_expired(&self) -> usize {
        0
    }
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn reserve(&self, _email: &str, _ip: Option<&str>) -> RateLimitDecision {
        RateLimitDecision::Allowed(Reservation(0))
    }

    async fn commit(&self, _reservation: Reservation, _email: &str, _ip: Option<&str>) {}

    async fn release(&self, _reservation: Reservation, _email: &str, _ip: Option<&str>) {}
}

/// Per-email and per-address cooldown markers. A marker's existence alone
/// blocks a new request until it expires or is released; the value is the
/// id of the reservation that placed it.
#[derive(Debug)]
pub struct CooldownRateLimiter {
    window: Duration,
    next_id: AtomicU64,
    gate: Mutex<()>,
    emails: TtlCache<String, u64>,
    ips: TtlCache<String, u64>,
}

impl CooldownRateLimiter {
    /// Windows above one year are capped.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.min(Duration::from_secs(MAX_TTL_SECONDS)),
            next_id: AtomicU64::new(1),
            gate: Mutex::new(()),
            emails: TtlCache::new(),
            ips: TtlCache::new(),
        }
    }
}

#[async_trait]
impl RateLimiter for CooldownRateLimiter {
    async fn reserve(&self, email: &str, ip: Option<&str>) -> RateLimitDecision {
        let email = email.to_string();
        let ip = ip.map(str::to_string);

        // Both lookups and both inserts happen while holding the gate.
        let _gate = self.gate.lock().await;
        if self.emails.contains(&email).await {
            return RateLimitDecision::Limited;
        }
        if let Some(ip) = &ip {
            if self.ips.contains(ip).await {
                return RateLimitDecision::Limited;
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if !self.emails.set(email.clone(), id, self.window).await {
            return RateLimitDecision::Limited;
        }
        if let Some(ip) = ip {
            if !self.ips.set(ip, id, self.window).await {
                self.emails.remove(&email).await;
                return RateLimitDecision::Limited;
            }
        }
        RateLimitDecision::Allowed(Reservation(id))
    }

    async fn commit(&self, reservation: Reservation, email: &str, ip: Option<&str>) {
        let Reservation(id) = reservation;
        self.emails.set(email.to_string(), id, self.window).await;
        if let Some(ip) = ip {
            self.ips.set(ip.to_string(), id, self.window).await;
        }
    }

    async fn release(&self, reservation: Reservation, email: &str, ip: Option<&str>) {
        let Reservation(id) = reservation;
        // A lapsed reservation may have been replaced by a newer one; leave that alone.
        self.emails
            .remove_if(&email.to_string(), |holder| *holder == id)
            .await;
        if let Some(ip) = ip {
            self.ips
                .remove_if(&ip.to_string(), |holder| *holder == id)
                .await;
        }
    }

    async fn purge_expired(&self) -> usize {
        self.emails.purge_expired().await + self.ips.purge_expired().await
    }
}
