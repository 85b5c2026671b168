//! One-time email verification codes.
//!
//! A code lives in an in-process TTL cache keyed by the normalized email. A
//! newer request overwrites the older code, a successful check consumes it,
//! and a mismatch leaves it in place. The email and client address are
//! reserved before a code is generated, so a request racing a slow delivery
//! is limited; the reservation becomes a cooldown only once delivery
//! succeeded, so a failed send never locks the caller out.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::{
    cache::TtlCache,
    error::{Error, Result},
    notifier::Notifier,
    rate_limit::{RateLimitDecision, RateLimiter},
    utils::{generate_code, normalize_email, valid_email},
};

const CODE_EMAIL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif; color: #222;">
    <p>Your {{SERVICE}} verification code is:</p>
    <p style="font-size: 28px; font-weight: bold; letter-spacing: 6px;">{{CODE}}</p>
    <p>The code expires in {{MINUTES}} minutes. If you did not request it, ignore this message.</p>
  </body>
</html>
"#;

pub struct CodeIssuer {
    codes: TtlCache<String, String>,
    limiter: Arc<dyn RateLimiter>,
    notifier: Arc<dyn Notifier>,
    code_ttl: Duration,
    service_name: String,
}

impl std::fmt::Debug for CodeIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeIssuer")
            .field("code_ttl", &self.code_ttl)
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

impl CodeIssuer {
    #[must_use]
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        notifier: Arc<dyn Notifier>,
        code_ttl: Duration,
        service_name: String,
    ) -> Self {
        Self {
            codes: TtlCache::new(),
            limiter,
            notifier,
            code_ttl,
            service_name,
        }
    }

    /// Generate, store and deliver a fresh code for `email`.
    ///
    /// # Errors
    /// `Validation` for a missing or malformed email or a code lifetime the
    /// clock cannot represent, `RateLimited` while another request holds or
    /// cooled down the email or the client address, `Delivery` when the
    /// notifier fails (the stored code is rolled back).
    #[instrument(skip(self, email))]
    pub async fn request_code(&self, email: &str, client_ip: Option<&str>) -> Result<()> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(Error::validation("Missing email"));
        }
        if !valid_email(&email) {
            return Err(Error::validation("Invalid email"));
        }

        let RateLimitDecision::Allowed(reservation) =
            self.limiter.reserve(&email, client_ip).await
        else {
            return Err(Error::RateLimited);
        };

        let code = generate_code();
        if !self
            .codes
            .set(email.clone(), code.clone(), self.code_ttl)
            .await
        {
            self.limiter.release(reservation, &email, client_ip).await;
            return Err(Error::validation("Code lifetime too large"));
        }

        let subject = format!("Your {} verification code", self.service_name);
        let body = self.render(&code);
        if let Err(err) = self.notifier.send(&email, &subject, &body).await {
            // Only drop the code we stored; a concurrent request may have replaced it.
            self.codes.remove_if(&email, |stored| *stored == code).await;
            self.limiter.release(reservation, &email, client_ip).await;
            warn!("verification code delivery failed: {err:#}");
            return Err(Error::Delivery(err));
        }

        self.limiter.commit(reservation, &email, client_ip).await;
        debug!("verification code issued");
        Ok(())
    }

    /// Check and consume the code for `email`. Wrong or expired codes return
    /// `false`; a wrong guess does not consume the stored code.
    pub async fn verify(&self, email: &str, code: &str) -> bool {
        let email = normalize_email(email);
        let code = code.trim();
        if email.is_empty() || code.is_empty() {
            return false;
        }
        self.codes.remove_if(&email, |stored| stored == code).await
    }

    /// Drop expired codes and cooldown markers.
    pub async fn purge_expired(&self) -> usize {
        self.codes.purge_expired().await + self.limiter.purge_expired().await
    }

    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let purged = self.purge_expired().await;
                if purged > 0 {
                    debug!(purged, "purged expired codes and markers");
                }
            }
        })
    }

    fn render(&self, code: &str) -> String {
        CODE_EMAIL_TEMPLATE
            .replace("{{SERVICE}}", &self.service_name)
            .replace("{{CODE}}", code)
            .replace("{{MINUTES}}", &(self.code_ttl.as_secs() / 60).to_string())
    }
}
