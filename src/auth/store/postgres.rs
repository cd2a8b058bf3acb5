//! Postgres backend for accounts and sessions.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgPool, Row, postgres::PgRow};
use tracing::{Instrument, Span, info_span, instrument};

use super::{CredentialStore, NewSession, SessionRecord, SessionStore, StoreError};
use crate::auth::account::{Account, AccountId, Role};

const CREATE_SESSIONS_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS user_sessions (
        session_hash BYTEA PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        last_seen_at TIMESTAMPTZ NOT NULL
    )
";

const CREATE_SESSIONS_EXPIRY_INDEX: &str = r"
    CREATE INDEX IF NOT EXISTS user_sessions_expires_at_idx
        ON user_sessions (expires_at)
";

/// One pool, created at startup and shared by every request.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the session table if it is missing. The `users` table is
    /// provisioned separately from `sql/schema.sql`.
    ///
    /// # Errors
    /// Returns an error if the DDL cannot be executed.
    #[instrument(skip(self))]
    pub async fn ensure_session_schema(&self) -> anyhow::Result<()> {
        for statement in [CREATE_SESSIONS_TABLE, CREATE_SESSIONS_EXPIRY_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .instrument(query_span("CREATE", statement))
                .await
                .context("failed to provision session table")?;
        }
        Ok(())
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        identity: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: Role::from_admin_flag(row.try_get("is_admin")?),
    })
}

#[async_trait]
impl CredentialStore for PgStore {
    #[instrument(skip(self))]
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>, StoreError> {
        let query = "SELECT id, email, password_hash, is_admin FROM users WHERE email = $1";
        let row = sqlx::query(query)
            .bind(identity)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup account by identity")?;

        Ok(row
            .as_ref()
            .map(account_from_row)
            .transpose()
            .context("failed to decode account row")?)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let query = "SELECT id, email, password_hash, is_admin FROM users WHERE id = $1";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup account by id")?;

        Ok(row
            .as_ref()
            .map(account_from_row)
            .transpose()
            .context("failed to decode account row")?)
    }

    #[instrument(skip(self, password_hash))]
    async fn create(
        &self,
        identity: &str,
        password_hash: Option<&str>,
    ) -> Result<Account, StoreError> {
        // The unique constraint on users.email is the check-and-insert.
        let query = r"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, is_admin
        ";
        let result = sqlx::query(query)
            .bind(identity)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(row) => Ok(account_from_row(&row).context("failed to decode account row")?),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict),
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to insert account")
                .into()),
        }
    }

    #[instrument(skip(self))]
    async fn set_role(&self, id: AccountId, role: Role) -> Result<bool, StoreError> {
        let query = "UPDATE users SET is_admin = $2, updated_at = NOW() WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(role.is_admin())
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update account role")?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    #[instrument(skip(self, session), fields(account_id = %session.account_id))]
    async fn insert(&self, session: NewSession) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO user_sessions (session_hash, user_id, created_at, expires_at, last_seen_at)
            VALUES ($1, $2, $3, $4, $3)
        ";
        let result = sqlx::query(query)
            .bind(&session.token_hash)
            .bind(session.account_id)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict),
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to insert session")
                .into()),
        }
    }

    #[instrument(skip_all)]
    async fn find(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>, StoreError> {
        let query = r"
            SELECT user_id, created_at, expires_at, last_seen_at
            FROM user_sessions
            WHERE session_hash = $1
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup session")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let record = SessionRecord {
            account_id: row.try_get("user_id").context("failed to decode session")?,
            created_at: row.try_get("created_at").context("failed to decode session")?,
            expires_at: row.try_get("expires_at").context("failed to decode session")?,
            last_seen_at: row
                .try_get("last_seen_at")
                .context("failed to decode session")?,
        };

        Ok(Some(record))
    }

    #[instrument(skip_all)]
    async fn touch(&self, token_hash: &[u8], at: DateTime<Utc>) -> Result<(), StoreError> {
        let query = "UPDATE user_sessions SET last_seen_at = $2 WHERE session_hash = $1";
        sqlx::query(query)
            .bind(token_hash)
            .bind(at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update session last_seen_at")?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn delete(&self, token_hash: &[u8]) -> Result<(), StoreError> {
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = "DELETE FROM user_sessions WHERE expires_at <= $1";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete expired sessions")?;
        Ok(result.rows_affected())
    }
}
