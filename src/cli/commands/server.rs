use clap::{Arg, Command};

use super::{auth, notifier, store};

pub const COMMAND: &str = "server";
pub const ARG_PORT: &str = "port";
pub const ARG_ADMIN_SECRET: &str = "admin-secret";

#[must_use]
pub fn command() -> Command {
    let command = Command::new(COMMAND)
        .about("Run the HTTP service")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("AUTHX_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_ADMIN_SECRET)
                .long(ARG_ADMIN_SECRET)
                .help("Shared secret for the x-admin-secret header; admin routes are disabled without it")
                .env("AUTHX_ADMIN_SECRET")
                .hide_env_values(true),
        );

    let command = store::with_args(command);
    let command = auth::with_args(command);
    notifier::with_args(command)
}
