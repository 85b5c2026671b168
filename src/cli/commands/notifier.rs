use anyhow::{anyhow, Context, Result};
use clap::{builder::PossibleValuesParser, Arg, ArgMatches, Command};
use std::time::Duration;
use url::Url;

pub const ARG_NOTIFIER: &str = "notifier";
pub const ARG_WEBHOOK_URL: &str = "notifier-webhook-url";
pub const ARG_WEBHOOK_TIMEOUT_SECONDS: &str = "notifier-timeout-seconds";

/// Where verification codes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierKind {
    Log,
    Webhook { url: Url, timeout: Duration },
}

impl NotifierKind {
    /// # Errors
    /// Returns an error if `webhook` is chosen without a valid URL.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        match matches.get_one::<String>(ARG_NOTIFIER).map(String::as_str) {
            None | Some("log") => Ok(Self::Log),
            Some("webhook") => {
                let raw = matches
                    .get_one::<String>(ARG_WEBHOOK_URL)
                    .context("missing required argument: --notifier-webhook-url")?;
                let url = Url::parse(raw)
                    .with_context(|| format!("invalid --{ARG_WEBHOOK_URL}: {raw}"))?;
                let timeout = matches
                    .get_one::<u64>(ARG_WEBHOOK_TIMEOUT_SECONDS)
                    .copied()
                    .map_or(Duration::from_secs(10), Duration::from_secs);
                Ok(Self::Webhook { url, timeout })
            }
            Some(other) => Err(anyhow!("unknown notifier: {other}")),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_NOTIFIER)
                .long(ARG_NOTIFIER)
                .help("Delivery for verification codes: log (development) or webhook")
                .env("AUTHX_NOTIFIER")
                .default_value("log")
                .value_parser(PossibleValuesParser::new(["log", "webhook"])),
        )
        .arg(
            Arg::new(ARG_WEBHOOK_URL)
                .long(ARG_WEBHOOK_URL)
                .help("Mail relay endpoint receiving {to, subject, html} JSON")
                .env("AUTHX_NOTIFIER_WEBHOOK_URL")
                .required_if_eq(ARG_NOTIFIER, "webhook"),
        )
        .arg(
            Arg::new(ARG_WEBHOOK_TIMEOUT_SECONDS)
                .long(ARG_WEBHOOK_TIMEOUT_SECONDS)
                .help("Timeout for a single relay request")
                .env("AUTHX_NOTIFIER_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
