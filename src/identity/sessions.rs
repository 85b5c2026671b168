//! Session issuance and validation against the whitelist.
//!
//! A token is only honoured while its `jti` has a live whitelist entry for the
//! same user. The signed `exp` claim only records the lifetime the session was
//! issued with; the entry's `expires_at` is authoritative and slides forward
//! when less than half the original lifetime remains.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{
    error::{Error, Result},
    models::SessionRecord,
    token::{Claims, TokenSigner},
};
use crate::store::{bounded, SessionStore};

/// A freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
}

/// A token that passed validation, with the whitelist expiry after renewal.
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    signer: TokenSigner,
    timeout: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, signer: TokenSigner, timeout: Duration) -> Self {
        Self {
            store,
            signer,
            timeout,
        }
    }

    /// # Errors
    /// Fails if the lifetime is under a second, does not fit the calendar, or
    /// the whitelist write fails;
    /// no token is returned without a stored entry.
    pub async fn issue(&self, user_id: i64, lifetime: Duration) -> Result<IssuedSession> {
        self.issue_at(user_id, lifetime, Utc::now()).await
    }

    /// # Errors
    /// See [`SessionManager::issue`].
    #[instrument(skip(self, now))]
    pub async fn issue_at(
        &self,
        user_id: i64,
        lifetime: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession> {
        let seconds = i64::try_from(lifetime.as_secs())
            .map_err(|_| Error::validation("Session lifetime too large"))?;
        if seconds <= 0 {
            return Err(Error::validation("Session lifetime must be positive"));
        }

        let iat = now.timestamp();
        let exp = iat.checked_add(seconds);
        let expires_at = chrono::Duration::try_seconds(seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
        let (Some(exp), Some(expires_at)) = (exp, expires_at) else {
            return Err(Error::validation("Session lifetime too large"));
        };

        let claims = Claims {
            user_id,
            jti: Uuid::new_v4().to_string(),
            iat,
            exp,
        };
        let token = self
            .signer
            .sign(&claims)
            .map_err(|err| Error::Internal(anyhow!(err)))?;

        let record = SessionRecord {
            token_id: claims.jti.clone(),
            user_id,
            expires_at,
        };
        bounded(
            self.timeout,
            "sessions.insert",
            self.store.insert_session(&record),
        )
        .await?;

        debug!(user_id, "session issued");
        Ok(IssuedSession {
            token,
            claims,
            expires_at: record.expires_at,
        })
    }

    /// Validate a bearer token. Any failure, store outages included, yields
    /// `None`.
    pub async fn validate(&self, token: &str) -> Option<ValidatedSession> {
        self.validate_at(token, Utc::now()).await
    }

    pub async fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Option<ValidatedSession> {
        let claims = match self.signer.verify(token) {
            Ok(claims) => claims,
            Err(err) => {
                debug!("rejected token: {err}");
                return None;
            }
        };

        let lookup = bounded(
            self.timeout,
            "sessions.find",
            self.store.find_session(&claims.jti, claims.user_id),
        )
        .await;
        let record = match lookup {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(user_id = claims.user_id, "token not whitelisted");
                return None;
            }
            Err(err) => {
                error!("session lookup failed, rejecting token: {err}");
                return None;
            }
        };

        if record.expires_at <= now {
            debug!(user_id = claims.user_id, "session expired");
            return None;
        }

        let original = claims.original_duration();
        let mut expires_at = record.expires_at;
        let renewal = now
            .checked_add_signed(original)
            .filter(|_| record.expires_at - now < original / 2);
        if let Some(renewed) = renewal {
            match bounded(
                self.timeout,
                "sessions.extend",
                self.store
                    .extend_session(&claims.jti, claims.user_id, renewed),
            )
            .await
            {
                Ok(()) => expires_at = renewed,
                Err(err) => warn!("failed to renew session: {err}"),
            }
        }

        Some(ValidatedSession { claims, expires_at })
    }

    /// Remove one whitelist entry. Revoking an unknown id is not an error.
    ///
    /// # Errors
    /// Store failures propagate.
    pub async fn revoke(&self, token_id: &str) -> Result<()> {
        let removed = bounded(
            self.timeout,
            "sessions.delete",
            self.store.delete_session(token_id),
        )
        .await?;
        debug!(removed, "session revoked");
        Ok(())
    }

    /// # Errors
    /// Store failures propagate.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64> {
        let removed = bounded(
            self.timeout,
            "sessions.delete_user",
            self.store.delete_user_sessions(user_id),
        )
        .await?;
        info!(user_id, removed, "revoked all sessions");
        Ok(removed)
    }

    /// # Errors
    /// Store failures propagate.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        Ok(bounded(
            self.timeout,
            "sessions.purge",
            self.store.delete_expired_sessions(now),
        )
        .await?)
    }

    /// Spawn the passive-expiry reaper that drops lapsed whitelist entries.
    pub fn spawn_reaper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match self.purge_expired(Utc::now()).await {
                    Ok(0) => {}
                    Ok(purged) => debug!(purged, "purged expired sessions"),
                    Err(err) => error!("session reaper failed: {err}"),
                }
            }
        })
    }
}
