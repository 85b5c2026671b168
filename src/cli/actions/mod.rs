pub mod server;
pub mod users;

// Single dispatch point for `Action`; extend the match in `run::execute`
// when adding a variant.
mod run;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::cli::commands::store;
use crate::identity::{AuthConfig, Identity, Notifier};
use crate::store::PgStore;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Register(users::RegisterArgs),
    Ban(users::BanArgs),
    Unban(users::UserArgs),
    Bans(users::UserArgs),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> Result<()> {
        run::execute(self).await
    }
}

/// Connect to Postgres, apply the schema and wire the identity core on top.
async fn connect(
    options: &store::Options,
    notifier: Arc<dyn Notifier>,
    config: &AuthConfig,
) -> Result<Identity> {
    let pg = PgStore::connect(&options.dsn, options.store_timeout).await?;
    pg.migrate().await.context("Failed to apply database schema")?;

    Identity::new(
        Arc::new(pg),
        options.signing_secret.clone(),
        notifier,
        config,
    )
    .context("Invalid signing secret")
}
