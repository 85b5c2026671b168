//! Registration and login.
//!
//! Registration runs validation before anything touches the store, then the
//! duplicate check, then the one-time code (public callers only), and only
//! then spends an id and the Argon2 hash. Login always verifies the password
//! before looking at suspensions, so a banned account and a wrong password
//! are indistinguishable to anyone without the password. Unknown accounts
//! are checked against a throwaway hash for the same reason. Suspensions are
//! checked again once the session is stored, so a ban racing the login
//! cannot leave a live session behind.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};

use super::{
    bans::BanLedger,
    codes::CodeIssuer,
    error::{Error, Result},
    models::{Account, BanRecord, LoginIdentifier},
    sequence::{SequenceAllocator, USER_ID_COUNTER},
    sessions::SessionManager,
    utils::{
        dummy_password_hash, hash_password, normalize_email, valid_email, valid_username,
        verify_password,
    },
};
use crate::store::{bounded, AccountStore, InsertOutcome};

/// Who is asking for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// Anonymous traffic; must prove the email with a one-time code.
    Public,
    /// Operator tooling; skips the one-time code.
    Trusted,
}

#[derive(Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub code: Option<String>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub user_id: i64,
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AccountService {
    store: Arc<dyn AccountStore>,
    sequence: SequenceAllocator,
    codes: Arc<CodeIssuer>,
    bans: Arc<BanLedger>,
    sessions: Arc<SessionManager>,
    session_ttl: Duration,
    timeout: Duration,
}

impl AccountService {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        sequence: SequenceAllocator,
        codes: Arc<CodeIssuer>,
        bans: Arc<BanLedger>,
        sessions: Arc<SessionManager>,
        session_ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            sequence,
            codes,
            bans,
            sessions,
            session_ttl,
            timeout,
        }
    }

    /// Create an account.
    ///
    /// # Errors
    /// `Validation` for missing or malformed input, `Conflict` when the
    /// username or email is taken, `InvalidCode` for a wrong or expired code,
    /// store failures as `Store`.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration, caller: Caller) -> Result<Account> {
        let username = registration.username.trim().to_lowercase();
        let password = registration.password.trim().to_string();
        let email = normalize_email(&registration.email);
        let code = registration.code.as_deref().map_or("", str::trim);

        if username.is_empty() || password.is_empty() || email.is_empty() {
            return Err(Error::validation("Missing fields"));
        }
        if !valid_username(&username) {
            return Err(Error::validation(
                "Username must contain only lowercase letters, digits and underscores",
            ));
        }
        if !valid_email(&email) {
            return Err(Error::validation("Invalid email"));
        }
        if caller == Caller::Public && code.is_empty() {
            return Err(Error::validation("Missing verification code"));
        }

        let taken = bounded(
            self.timeout,
            "users.exists",
            self.store.account_exists(&username, &email),
        )
        .await?;
        if taken {
            return Err(Error::Conflict);
        }

        if caller == Caller::Public && !self.codes.verify(&email, code).await {
            return Err(Error::InvalidCode);
        }

        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|err| Error::Internal(anyhow!(err)))?
            .map_err(Error::Internal)?;

        let account = Account {
            id: self.sequence.next(USER_ID_COUNTER).await?,
            username,
            email,
            password_hash,
            created_at: Utc::now(),
        };

        match bounded(
            self.timeout,
            "users.insert",
            self.store.insert_account(&account),
        )
        .await?
        {
            InsertOutcome::Created => {
                info!(user_id = account.id, ?caller, "account registered");
                Ok(account)
            }
            InsertOutcome::Conflict => Err(Error::Conflict),
        }
    }

    /// Check credentials and open a session.
    ///
    /// # Errors
    /// `Unauthorized` for an unknown account or wrong password, `Suspended`
    /// for a correct password on a banned account.
    #[instrument(skip(self, identifier, password))]
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<LoginSession> {
        let identifier = identifier.trim();
        let password = password.trim().to_string();
        if identifier.is_empty() || password.is_empty() {
            return Err(Error::validation("Missing fields"));
        }

        let lookup = LoginIdentifier::classify(identifier);
        let account = bounded(self.timeout, "users.find", self.store.find_account(&lookup))
            .await?;
        let Some(account) = account else {
            // Pay for a full verification so unknown accounts answer as slowly as wrong passwords.
            tokio::task::spawn_blocking(move || verify_password(&password, dummy_password_hash()))
                .await
                .map_err(|err| Error::Internal(anyhow!(err)))?;
            debug!("login for unknown account");
            return Err(Error::Unauthorized);
        };

        let password_hash = account.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|err| Error::Internal(anyhow!(err)))?;
        if !matches {
            debug!(user_id = account.id, "login with wrong password");
            return Err(Error::Unauthorized);
        }

        if let Some(ban) = self.bans.is_banned(account.id).await? {
            info!(user_id = account.id, ban_id = %ban.ban_id, "login refused, account suspended");
            return Err(suspended(ban));
        }

        let issued = self.sessions.issue(account.id, self.session_ttl).await?;

        // A ban placed since the check above revoked the user's sessions
        // before this one was written; look again and take it back.
        let refusal = match self.bans.is_banned(account.id).await {
            Ok(None) => None,
            Ok(Some(ban)) => {
                info!(user_id = account.id, ban_id = %ban.ban_id, "login refused, banned during login");
                Some(suspended(ban))
            }
            Err(err) => Some(err),
        };
        if let Some(err) = refusal {
            if let Err(revoke_err) = self.sessions.revoke(&issued.claims.jti).await {
                warn!(user_id = account.id, "failed to take back session: {revoke_err}");
            }
            return Err(err);
        }

        info!(user_id = account.id, "login succeeded");
        Ok(LoginSession {
            user_id: account.id,
            username: account.username,
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }
}

fn suspended(ban: BanRecord) -> Error {
    Error::Suspended {
        reason: ban.reason,
        until: ban.ban_end,
    }
}
