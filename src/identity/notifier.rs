//! Outbound delivery of one-time codes.
//!
//! The issuer hands a rendered message to a `Notifier` and treats any error as
//! a failed delivery. `LogNotifier` is the local development stub; the
//! `WebhookNotifier` posts the message to a mail relay over HTTP.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message or return an error so the caller can roll back.
    async fn send(&self, recipient: &str, subject: &str, body_html: &str) -> Result<()>;
}

/// Local dev notifier that logs the message instead of sending it.
#[derive(Clone, Debug)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, subject: &str, body_html: &str) -> Result<()> {
        info!(
            to_email = %recipient,
            subject = %subject,
            body = %body_html,
            "notifier send stub"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Posts `{to, subject, html}` JSON to a relay endpoint.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Error creating notifier HTTP client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, body_html), fields(url = %self.url))]
    async fn send(&self, recipient: &str, subject: &str, body_html: &str) -> Result<()> {
        self.client
            .post(self.url.clone())
            .json(&WebhookMessage {
                to: recipient,
                subject,
                html: body_html,
            })
            .send()
            .await
            .context("notifier request failed")?
            .error_for_status()
            .context("notifier rejected message")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_accepts() {
        assert!(LogNotifier
            .send("a@b.com", "subject", "<p>123456</p>")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn webhook_notifier_reports_unreachable_relay() -> Result<()> {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let notifier = WebhookNotifier::new(
            Url::parse("http://127.0.0.1:9/send")?,
            Duration::from_millis(500),
        )?;
        assert!(notifier
            .send("a@b.com", "subject", "<p>123456</p>")
            .await
            .is_err());
        Ok(())
    }

    #[test]
    fn webhook_message_shape() -> Result<()> {
        let json = serde_json::to_value(WebhookMessage {
            to: "a@b.com",
            subject: "s",
            html: "<p>x</p>",
        })?;
        assert_eq!(json["to"], "a@b.com");
        assert_eq!(json["html"], "<p>x</p>");
        Ok(())
    }
}
