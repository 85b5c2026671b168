//! Tunables for the identity core.

use std::time::Duration;

use crate::store::DEFAULT_STORE_TIMEOUT;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 72 * 60 * 60;
const DEFAULT_CODE_TTL_SECONDS: u64 = 10 * 60;
const DEFAULT_RATE_LIMIT_SECONDS: u64 = 60;
const DEFAULT_REAPER_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_SERVICE_NAME: &str = "authx";

/// Upper bound for every lifetime and interval: one year.
pub const MAX_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    service_name: String,
    session_ttl: Duration,
    code_ttl: Duration,
    rate_limit_window: Duration,
    store_timeout: Duration,
    reaper_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS),
            code_ttl: Duration::from_secs(DEFAULT_CODE_TTL_SECONDS),
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_SECONDS),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            reaper_interval: Duration::from_secs(DEFAULT_REAPER_INTERVAL_SECONDS),
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used in verification mail subjects and bodies.
    #[must_use]
    pub fn with_service_name(mut self, name: String) -> Self {
        self.service_name = name;
        self
    }

    /// Values above [`MAX_TTL_SECONDS`] are capped, here and in the other
    /// lifetime setters.
    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl = Duration::from_secs(seconds.min(MAX_TTL_SECONDS));
        self
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: u64) -> Self {
        self.code_ttl = Duration::from_secs(seconds.min(MAX_TTL_SECONDS));
        self
    }

    /// A zero window disables code request rate limiting.
    #[must_use]
    pub fn with_rate_limit_seconds(mut self, seconds: u64) -> Self {
        self.rate_limit_window = Duration::from_secs(seconds.min(MAX_TTL_SECONDS));
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reaper_interval_seconds(mut self, seconds: u64) -> Self {
        self.reaper_interval = Duration::from_secs(seconds.min(MAX_TTL_SECONDS));
        self
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    #[must_use]
    pub fn code_ttl(&self) -> Duration {
        self.code_ttl
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        self.rate_limit_window
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    #[must_use]
    pub fn reaper_interval(&self) -> Duration {
        self.reaper_interval
    }
}
