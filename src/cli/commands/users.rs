//! Operator subcommands acting on a single account.

use chrono::{DateTime, Utc};
use clap::{builder::ValueParser, Arg, Command};

use super::store;

pub const COMMAND_REGISTER: &str = "register";
pub const COMMAND_BAN: &str = "ban";
pub const COMMAND_UNBAN: &str = "unban";
pub const COMMAND_BANS: &str = "bans";

pub const ARG_USERNAME: &str = "username";
pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_USER_ID: &str = "user-id";
pub const ARG_REASON: &str = "reason";
pub const ARG_UNTIL: &str = "until";
pub const ARG_BANNED_BY: &str = "banned-by";

#[must_use]
pub fn validator_rfc3339() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<DateTime<Utc>, String> {
        DateTime::parse_from_rfc3339(value)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|err| format!("expected an RFC 3339 timestamp: {err}"))
    })
}

fn user_id() -> Arg {
    Arg::new(ARG_USER_ID)
        .short('u')
        .long(ARG_USER_ID)
        .help("Account id")
        .required(true)
        .value_parser(clap::value_parser!(i64).range(1..))
}

#[must_use]
pub fn register() -> Command {
    store::with_args(
        Command::new(COMMAND_REGISTER)
            .about("Create an account without a one-time code")
            .arg(
                Arg::new(ARG_USERNAME)
                    .long(ARG_USERNAME)
                    .help("Login name (lowercase letters, digits and underscores)")
                    .required(true),
            )
            .arg(
                Arg::new(ARG_EMAIL)
                    .long(ARG_EMAIL)
                    .help("Account e-mail")
                    .required(true),
            )
            .arg(
                Arg::new(ARG_PASSWORD)
                    .long(ARG_PASSWORD)
                    .help("Account password")
                    .env("AUTHX_REGISTER_PASSWORD")
                    .hide_env_values(true)
                    .required(true),
            ),
    )
}

#[must_use]
pub fn ban() -> Command {
    store::with_args(
        Command::new(COMMAND_BAN)
            .about("Suspend an account and revoke its sessions")
            .arg(user_id())
            .arg(
                Arg::new(ARG_REASON)
                    .long(ARG_REASON)
                    .help("Reason shown to the user at login"),
            )
            .arg(
                Arg::new(ARG_UNTIL)
                    .long(ARG_UNTIL)
                    .help("End of the suspension (RFC 3339); indefinite when omitted")
                    .value_parser(validator_rfc3339()),
            )
            .arg(
                Arg::new(ARG_BANNED_BY)
                    .long(ARG_BANNED_BY)
                    .help("Account id of the operator placing the ban")
                    .value_parser(clap::value_parser!(i64)),
            ),
    )
}

#[must_use]
pub fn unban() -> Command {
    store::with_args(
        Command::new(COMMAND_UNBAN)
            .about("Lift every active suspension of an account")
            .arg(user_id()),
    )
}

#[must_use]
pub fn bans() -> Command {
    store::with_args(
        Command::new(COMMAND_BANS)
            .about("List the suspension history of an account")
            .arg(user_id()),
    )
}
