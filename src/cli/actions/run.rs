use crate::cli::actions::{Action, server, set_role};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
        Action::SetRole(args) => set_role::execute(args).await,
    }
}
