//! Turn parsed arguments into an `Action`.

use crate::cli::{
    actions::{server, users, Action},
    commands::{
        auth,
        notifier::NotifierKind,
        server::{ARG_ADMIN_SECRET, ARG_PORT, COMMAND},
        store,
        users::{
            ARG_BANNED_BY, ARG_EMAIL, ARG_PASSWORD, ARG_REASON, ARG_UNTIL, ARG_USERNAME,
            ARG_USER_ID, COMMAND_BAN, COMMAND_BANS, COMMAND_REGISTER, COMMAND_UNBAN,
        },
    },
};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::ArgMatches;
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((COMMAND, sub)) => server_args(sub).map(Action::Server),
        Some((COMMAND_REGISTER, sub)) => Ok(Action::Register(users::RegisterArgs {
            store: store::Options::parse(sub)?,
            username: required(sub, ARG_USERNAME)?,
            email: required(sub, ARG_EMAIL)?,
            password: SecretString::from(required(sub, ARG_PASSWORD)?),
        })),
        Some((COMMAND_BAN, sub)) => Ok(Action::Ban(users::BanArgs {
            store: store::Options::parse(sub)?,
            user_id: user_id(sub)?,
            reason: sub.get_one::<String>(ARG_REASON).cloned(),
            until: sub.get_one::<DateTime<Utc>>(ARG_UNTIL).copied(),
            banned_by: sub.get_one::<i64>(ARG_BANNED_BY).copied(),
        })),
        Some((COMMAND_UNBAN, sub)) => user_args(sub).map(Action::Unban),
        Some((COMMAND_BANS, sub)) => user_args(sub).map(Action::Bans),
        Some((other, _)) => Err(anyhow!("unknown subcommand: {other}")),
        None => Err(anyhow!("missing subcommand")),
    }
}

fn server_args(sub: &ArgMatches) -> Result<server::Args> {
    Ok(server::Args {
        port: sub.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
        admin_secret: sub
            .get_one::<String>(ARG_ADMIN_SECRET)
            .filter(|secret| !secret.is_empty())
            .cloned()
            .map(SecretString::from),
        store: store::Options::parse(sub)?,
        auth: auth::Options::parse(sub)?,
        notifier: NotifierKind::parse(sub)?,
    })
}

fn user_args(sub: &ArgMatches) -> Result<users::UserArgs> {
    Ok(users::UserArgs {
        store: store::Options::parse(sub)?,
        user_id: user_id(sub)?,
    })
}

fn user_id(sub: &ArgMatches) -> Result<i64> {
    sub.get_one::<i64>(ARG_USER_ID)
        .copied()
        .context("missing required argument: --user-id")
}

fn required(sub: &ArgMatches, name: &str) -> Result<String> {
    sub.get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}
