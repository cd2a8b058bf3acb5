use crate::auth::{CredentialStore, PgStore, Role, account::normalize_identity};
use anyhow::{Context, Result, anyhow};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub identity: String,
    pub role: Role,
}

/// Change the role of an existing account directly in the store.
///
/// Sessions are not touched: the new role applies to the next request because
/// validation always re-reads the account.
///
/// # Errors
/// Returns an error if the database is unreachable or no account has the identity.
pub async fn execute(args: Args) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;
    let store = PgStore::new(pool);

    apply(&store, &args.identity, args.role).await
}

pub(crate) async fn apply(store: &dyn CredentialStore, identity: &str, role: Role) -> Result<()> {
    let identity = normalize_identity(identity);
    let account = store
        .find_by_identity(&identity)
        .await
        .context("Failed to look up account")?
        .ok_or_else(|| anyhow!("No account found for {identity}"))?;

    let updated = store
        .set_role(account.id, role)
        .await
        .context("Failed to update role")?;
    if !updated {
        return Err(anyhow!("No account found for {identity}"));
    }

    info!(identity = %identity, role = %role, "Role updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;

    #[tokio::test]
    async fn apply_flips_role_for_normalized_identity() {
        let store = MemoryStore::new();
        let created = store.create("ada@example.com", Some("$argon2id$x")).await;
        assert!(created.is_ok());

        let result = apply(&store, "  Ada@Example.com ", Role::Admin).await;
        assert!(result.is_ok());

        let account = store.find_by_identity("ada@example.com").await.ok().flatten();
        assert_eq!(account.map(|account| account.role), Some(Role::Admin));
    }

    #[tokio::test]
    async fn apply_unknown_identity_fails() {
        let store = MemoryStore::new();
        let result = apply(&store, "nobody@example.com", Role::Admin).await;
        assert!(result.is_err());
    }
}
