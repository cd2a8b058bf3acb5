//! In-process backend with the same atomicity guarantees as Postgres.
//!
//! Each check-and-insert happens under one lock. Used by tests and for local
//! experiments; it does not survive restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CredentialStore, NewSession, SessionRecord, SessionStore, StoreError};
use crate::auth::account::{Account, AccountId, Role};

#[derive(Default)]
struct Accounts {
    by_id: HashMap<AccountId, Account>,
    by_identity: HashMap<String, AccountId>,
}

#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<Accounts>,
    sessions: Mutex<HashMap<Vec<u8>, SessionRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.lock().await.by_id.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .by_identity
            .get(identity)
            .and_then(|id| accounts.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.lock().await.by_id.get(&id).cloned())
    }

    async fn create(
        &self,
        identity: &str,
        password_hash: Option<&str>,
    ) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.by_identity.contains_key(identity) {
            return Err(StoreError::Conflict);
        }

        let account = Account {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            password_hash: password_hash.map(str::to_string),
            role: Role::User,
        };
        accounts
            .by_identity
            .insert(account.identity.clone(), account.id);
        accounts.by_id.insert(account.id, account.clone());

        Ok(account)
    }

    async fn set_role(&self, id: AccountId, role: Role) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.lock().await;
        Ok(accounts.by_id.get_mut(&id).is_some_and(|account| {
            account.role = role;
            true
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: NewSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.token_hash) {
            return Err(StoreError::Conflict);
        }
        sessions.insert(
            session.token_hash,
            SessionRecord {
                account_id: session.account_id,
                created_at: session.created_at,
                expires_at: session.expires_at,
                last_seen_at: session.created_at,
            },
        );
        Ok(())
    }

    async fn find(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.lock().await.get(token_hash).cloned())
    }

    async fn touch(&self, token_hash: &[u8], at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(record) = self.sessions.lock().await.get_mut(token_hash) {
            record.last_seen_at = at;
        }
        Ok(())
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<(), StoreError> {
        self.sessions.lock().await.remove(token_hash);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}
