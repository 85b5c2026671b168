//! One-shot operator actions. Each prints its result as JSON on stdout.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    cli::commands::store,
    identity::{
        models::{Account, NewBan},
        AuthConfig, Caller, Identity, LogNotifier, Registration,
    },
};

#[derive(Debug)]
pub struct RegisterArgs {
    pub store: store::Options,
    pub username: String,
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug)]
pub struct BanArgs {
    pub store: store::Options,
    pub user_id: i64,
    pub reason: Option<String>,
    pub until: Option<DateTime<Utc>>,
    pub banned_by: Option<i64>,
}

#[derive(Debug)]
pub struct UserArgs {
    pub store: store::Options,
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
struct Registered<'a> {
    user_id: i64,
    username: &'a str,
    email: &'a str,
    created_at: DateTime<Utc>,
}

impl<'a> From<&'a Account> for Registered<'a> {
    fn from(account: &'a Account) -> Self {
        Self {
            user_id: account.id,
            username: &account.username,
            email: &account.email,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct Lifted {
    user_id: i64,
    lifted: u64,
}

// Operator commands never send codes, so the log notifier is enough.
async fn identity(options: &store::Options) -> Result<Identity> {
    let config = AuthConfig::new().with_store_timeout(options.store_timeout);
    super::connect(options, Arc::new(LogNotifier), &config).await
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// # Errors
/// Returns an error if the account cannot be created.
pub async fn register(args: RegisterArgs) -> Result<()> {
    let identity = identity(&args.store).await?;

    let registration = Registration {
        username: args.username,
        password: args.password.expose_secret().to_string(),
        email: args.email,
        code: None,
    };

    let account = identity
        .accounts
        .register(registration, Caller::Trusted)
        .await
        .context("Registration failed")?;

    print_json(&Registered::from(&account))
}

/// # Errors
/// Returns an error if the ban cannot be recorded.
pub async fn ban(args: BanArgs) -> Result<()> {
    let identity = identity(&args.store).await?;

    let record = identity
        .bans
        .ban(NewBan {
            user_id: args.user_id,
            banned_by: args.banned_by,
            reason: args.reason,
            ban_end: args.until,
        })
        .await
        .with_context(|| format!("Failed to ban user {}", args.user_id))?;

    print_json(&record)
}

/// # Errors
/// Returns an error if the store update fails.
pub async fn unban(args: UserArgs) -> Result<()> {
    let identity = identity(&args.store).await?;

    let lifted = identity
        .bans
        .unban(args.user_id)
        .await
        .with_context(|| format!("Failed to unban user {}", args.user_id))?;

    print_json(&Lifted {
        user_id: args.user_id,
        lifted,
    })
}

/// # Errors
/// Returns an error if the history cannot be read.
pub async fn bans(args: UserArgs) -> Result<()> {
    let identity = identity(&args.store).await?;

    let history = identity
        .bans
        .history(args.user_id)
        .await
        .with_context(|| format!("Failed to read bans of user {}", args.user_id))?;

    print_json(&history)
}
