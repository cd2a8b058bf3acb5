//! Durable storage seams for accounts and sessions.
//!
//! Both traits are the only shared mutable state in the service. Backends
//! must make `CredentialStore::create` a single atomic check-and-insert
//! (a unique constraint in Postgres, one lock in the memory backend) so two
//! concurrent registrations of the same identity cannot both succeed.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::account::{Account, AccountId, Role};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key (identity or session hash) already exists.
    #[error("unique key already exists")]
    Conflict,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Insert a new account, or fail with [`StoreError::Conflict`] if the
    /// identity is taken.
    async fn create(
        &self,
        identity: &str,
        password_hash: Option<&str>,
    ) -> Result<Account, StoreError>;

    /// Returns `false` when no account has this id.
    async fn set_role(&self, id: AccountId, role: Role) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Session row as written at issuance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSession {
    pub token_hash: Vec<u8>,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Session row as read back. Holds only the account reference, never the role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the hash already exists.
    async fn insert(&self, session: NewSession) -> Result<(), StoreError>;

    /// Returns the row regardless of expiry; the caller decides validity.
    async fn find(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>, StoreError>;

    /// Record activity. Never moves `expires_at`.
    async fn touch(&self, token_hash: &[u8], at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Deleting a missing row is not an error.
    async fn delete(&self, token_hash: &[u8]) -> Result<(), StoreError>;

    /// Remove rows with `expires_at <= now`, returning how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
