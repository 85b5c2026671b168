//! Account suspensions.
//!
//! Bans are append-only records; lifting a ban flips `is_active` instead of
//! deleting history. Placing a ban also revokes every live session of the
//! user, so a suspended account loses access immediately.

use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, instrument};

use super::{
    error::{Error, Result},
    models::{BanRecord, NewBan},
    sessions::SessionManager,
};
use crate::store::{bounded, BanStore};

pub struct BanLedger {
    store: Arc<dyn BanStore>,
    sessions: Arc<SessionManager>,
    timeout: Duration,
}

impl BanLedger {
    #[must_use]
    pub fn new(store: Arc<dyn BanStore>, sessions: Arc<SessionManager>, timeout: Duration) -> Self {
        Self {
            store,
            sessions,
            timeout,
        }
    }

    /// The ban currently in force for the user, if any.
    ///
    /// # Errors
    /// Store failures propagate.
    pub async fn is_banned(&self, user_id: i64) -> Result<Option<BanRecord>> {
        self.is_banned_at(user_id, Utc::now()).await
    }

    /// # Errors
    /// Store failures propagate.
    pub async fn is_banned_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<Option<BanRecord>> {
        Ok(bounded(
            self.timeout,
            "bans.find_active",
            self.store.find_active_ban(user_id, now),
        )
        .await?)
    }

    /// Record a ban starting now, then revoke the user's sessions.
    ///
    /// If the revocation fails the ban record stays in force and the error is
    /// returned. Calling `ban` again is safe: bans stack, the newest active
    /// one is reported, and `unban` lifts them all.
    ///
    /// # Errors
    /// `Validation` for an end that is not in the future; store failures,
    /// including a failed revocation, propagate.
    #[instrument(skip(self, ban), fields(user_id = ban.user_id))]
    pub async fn ban(&self, mut ban: NewBan) -> Result<BanRecord> {
        let now = Utc::now();
        if ban.ban_end.is_some_and(|end| end <= now) {
            return Err(Error::validation("Ban end must be in the future"));
        }
        ban.reason = ban
            .reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty());

        let record = bounded(self.timeout, "bans.insert", self.store.insert_ban(&ban, now)).await?;
        if let Err(err) = self.sessions.revoke_all_for_user(ban.user_id).await {
            error!(
                ban_id = %record.ban_id,
                "ban recorded but sessions were not revoked: {err}"
            );
            return Err(err);
        }

        info!(
            ban_id = %record.ban_id,
            banned_by = ?record.banned_by,
            until = ?record.ban_end,
            "user banned"
        );
        Ok(record)
    }

    /// Deactivate every active ban of the user; returns how many were lifted.
    ///
    /// # Errors
    /// Store failures propagate.
    #[instrument(skip(self))]
    pub async fn unban(&self, user_id: i64) -> Result<u64> {
        let lifted = bounded(
            self.timeout,
            "bans.deactivate",
            self.store.deactivate_bans(user_id, Utc::now()),
        )
        .await?;
        info!(lifted, "user unbanned");
        Ok(lifted)
    }

    /// Full ban history of the user, newest first.
    ///
    /// # Errors
    /// Store failures propagate.
    pub async fn history(&self, user_id: i64) -> Result<Vec<BanRecord>> {
        Ok(bounded(self.timeout, "bans.list", self.store.list_bans(user_id)).await?)
    }
}
