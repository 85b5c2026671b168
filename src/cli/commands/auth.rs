use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

use crate::identity::{config::MAX_TTL_SECONDS, AuthConfig};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_CODE_RATE_LIMIT_SECONDS: &str = "code-rate-limit-seconds";
pub const ARG_REAPER_INTERVAL_SECONDS: &str = "reaper-interval-seconds";
pub const ARG_SERVICE_NAME: &str = "service-name";

#[derive(Debug)]
pub struct Options {
    pub session_ttl_seconds: u64,
    pub code_ttl_seconds: u64,
    pub code_rate_limit_seconds: u64,
    pub reaper_interval_seconds: u64,
    pub service_name: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a value cannot be read.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let seconds = |name: &str, default: u64| matches.get_one::<u64>(name).copied().unwrap_or(default);
        Ok(Self {
            session_ttl_seconds: seconds(ARG_SESSION_TTL_SECONDS, 259_200),
            code_ttl_seconds: seconds(ARG_CODE_TTL_SECONDS, 600),
            code_rate_limit_seconds: seconds(ARG_CODE_RATE_LIMIT_SECONDS, 60),
            reaper_interval_seconds: seconds(ARG_REAPER_INTERVAL_SECONDS, 60),
            service_name: matches
                .get_one::<String>(ARG_SERVICE_NAME)
                .cloned()
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
        })
    }

    #[must_use]
    pub fn into_config(self, base: AuthConfig) -> AuthConfig {
        base.with_session_ttl_seconds(self.session_ttl_seconds)
            .with_code_ttl_seconds(self.code_ttl_seconds)
            .with_rate_limit_seconds(self.code_rate_limit_seconds)
            .with_reaper_interval_seconds(self.reaper_interval_seconds)
            .with_service_name(self.service_name)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds; renewed once half has passed")
                .env("AUTHX_SESSION_TTL_SECONDS")
                .default_value("259200")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("One-time code lifetime in seconds")
                .env("AUTHX_CODE_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_CODE_RATE_LIMIT_SECONDS)
                .long(ARG_CODE_RATE_LIMIT_SECONDS)
                .help("Cooldown between code requests per email and per address (0 disables)")
                .env("AUTHX_CODE_RATE_LIMIT_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(0..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REAPER_INTERVAL_SECONDS)
                .long(ARG_REAPER_INTERVAL_SECONDS)
                .help("Interval of the expired session and code sweep")
                .env("AUTHX_REAPER_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SERVICE_NAME)
                .long(ARG_SERVICE_NAME)
                .help("Service name shown in verification emails")
                .env("AUTHX_SERVICE_NAME")
                .default_value("authx"),
        )
}
