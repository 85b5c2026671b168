use crate::cli::actions::{server, users, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
        Action::Register(args) => users::register(args).await,
        Action::Ban(args) => users::ban(args).await,
        Action::Unban(args) => users::unban(args).await,
        Action::Bans(args) => users::bans(args).await,
    }
}
