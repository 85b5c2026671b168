use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    api::{self, AdminGuard},
    cli::commands::{auth, notifier::NotifierKind, store},
    identity::{AuthConfig, LogNotifier, Notifier, WebhookNotifier},
};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub admin_secret: Option<SecretString>,
    pub store: store::Options,
    pub auth: auth::Options,
    pub notifier: NotifierKind,
}

fn build_notifier(kind: NotifierKind) -> Result<Arc<dyn Notifier>> {
    match kind {
        NotifierKind::Log => {
            warn!("Verification codes are written to the log; use --notifier webhook in production");
            Ok(Arc::new(LogNotifier))
        }
        NotifierKind::Webhook { url, timeout } => {
            info!("Verification codes are delivered through {}", url);
            let notifier =
                WebhookNotifier::new(url, timeout).context("Failed to build webhook notifier")?;
            Ok(Arc::new(notifier))
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let notifier = build_notifier(args.notifier)?;

    let config = args
        .auth
        .into_config(AuthConfig::new().with_store_timeout(args.store.store_timeout));

    let identity = super::connect(&args.store, notifier, &config).await?;

    if args.admin_secret.is_none() {
        info!("No admin secret configured; admin routes are disabled");
    }

    api::serve(args.port, identity, AdminGuard::new(args.admin_secret)).await
}
