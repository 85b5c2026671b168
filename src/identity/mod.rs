//! Identity core: accounts, one-time codes, sessions and suspensions.
//!
//! Everything here is transport independent. The HTTP API and the CLI both
//! build an [`Identity`] over a [`crate::store::Store`] and call into it.

pub mod accounts;
pub mod bans;
pub mod cache;
pub mod codes;
pub mod config;
pub mod error;
pub mod models;
pub mod notifier;
pub mod rate_limit;
pub mod sequence;
pub mod sessions;
pub mod token;
pub(crate) mod utils;

pub use accounts::{AccountService, Caller, LoginSession, Registration};
pub use bans::BanLedger;
pub use codes::CodeIssuer;
pub use config::AuthConfig;
pub use error::{Error, Outcome, Result};
pub use notifier::{LogNotifier, Notifier, WebhookNotifier};
pub use sessions::{IssuedSession, SessionManager, ValidatedSession};
pub use token::{Claims, TokenError, TokenSigner};

use secrecy::SecretString;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::store::{AccountStore, BanStore, CounterStore, SessionStore, Store};
use rate_limit::{CooldownRateLimiter, NoopRateLimiter, RateLimiter};
use sequence::SequenceAllocator;

/// The wired identity components sharing one store.
#[derive(Clone)]
pub struct Identity {
    pub accounts: Arc<AccountService>,
    pub codes: Arc<CodeIssuer>,
    pub bans: Arc<BanLedger>,
    pub sessions: Arc<SessionManager>,
    store: Arc<dyn Store>,
    config: AuthConfig,
}

impl Identity {
    /// # Errors
    /// Returns `TokenError::EmptyKey` when the signing secret is empty.
    pub fn new<S>(
        store: Arc<S>,
        signing_secret: SecretString,
        notifier: Arc<dyn Notifier>,
        config: &AuthConfig,
    ) -> Result<Self, TokenError>
    where
        S: Store + 'static,
    {
        let signer = TokenSigner::new(signing_secret)?;
        let timeout = config.store_timeout();

        let counters: Arc<dyn CounterStore> = store.clone();
        let directory: Arc<dyn AccountStore> = store.clone();
        let whitelist: Arc<dyn SessionStore> = store.clone();
        let ledger: Arc<dyn BanStore> = store.clone();

        let limiter: Arc<dyn RateLimiter> = if config.rate_limit_window().is_zero() {
            Arc::new(NoopRateLimiter)
        } else {
            Arc::new(CooldownRateLimiter::new(config.rate_limit_window()))
        };

        let sessions = Arc::new(SessionManager::new(whitelist, signer, timeout));
        let bans = Arc::new(BanLedger::new(ledger, sessions.clone(), timeout));
        let codes = Arc::new(CodeIssuer::new(
            limiter,
            notifier,
            config.code_ttl(),
            config.service_name().to_string(),
        ));
        let accounts = Arc::new(AccountService::new(
            directory,
            SequenceAllocator::new(counters, timeout),
            codes.clone(),
            bans.clone(),
            sessions.clone(),
            config.session_ttl(),
            timeout,
        ));

        Ok(Self {
            accounts,
            codes,
            bans,
            sessions,
            store,
            config: config.clone(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Round-trip the backing store under the configured timeout.
    ///
    /// # Errors
    /// Returns the store error when the store is down or slow.
    pub async fn ping(&self) -> Result<()> {
        Ok(crate::store::bounded(self.config.store_timeout(), "store.ping", self.store.ping()).await?)
    }

    /// Start the session reaper and the code sweeper.
    #[must_use]
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let interval = self.config.reaper_interval();
        vec![
            self.sessions.clone().spawn_reaper(interval),
            self.codes.clone().spawn_sweeper(interval),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn empty_secret_rejected() {
        let result = Identity::new(
            Arc::new(MemoryStore::new()),
            SecretString::from(String::new()),
            Arc::new(LogNotifier),
            &AuthConfig::new(),
        );
        assert!(matches!(result, Err(TokenError::EmptyKey)));
    }

    #[tokio::test]
    async fn ping_follows_store_health() {
        let store = Arc::new(MemoryStore::new());
        let identity = Identity::new(
            store.clone(),
            SecretString::from("secret".to_string()),
            Arc::new(LogNotifier),
            &AuthConfig::new(),
        )
        .unwrap_or_else(|err| panic!("{err}"));
        assert!(identity.ping().await.is_ok());
        store.set_offline(true);
        assert!(matches!(identity.ping().await, Err(Error::Store(_))));
    }
}
