pub mod server;
pub mod set_role;

// The match over `Action` lives in `run` so this module stays a list of variants.
mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    SetRole(set_role::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
