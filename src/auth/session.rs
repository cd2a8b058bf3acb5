//! Server-side sessions behind opaque tokens.
//!
//! The client holds a random token; storage holds only its SHA-256 hash, the
//! owning account id and the absolute expiry. Validation re-reads the account
//! every time so the returned role is never older than the request.

use anyhow::{Context, anyhow};
use base64::Engine;
use chrono::Duration;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::{future::Future, sync::Arc, time::Duration as StdDuration};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::{
    account::{AccountId, Principal},
    clock::{Clock, SystemClock},
    error::AuthError,
    store::{CredentialStore, NewSession, SessionStore, StoreError},
};

const ISSUE_ATTEMPTS: usize = 3;

/// Longest accepted session lifetime, one year.
pub const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    ttl: Duration,
    store_timeout: StdDuration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(10),
            store_timeout: StdDuration::from_secs(3),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifetime is clamped to `1..=MAX_SESSION_TTL_SECONDS`.
    #[must_use]
    pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        if let Some(ttl) = Duration::try_seconds(ttl_seconds.clamp(1, MAX_SESSION_TTL_SECONDS)) {
            self.ttl = ttl;
        }
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, store_timeout: StdDuration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    #[must_use]
    pub fn store_timeout(&self) -> StdDuration {
        self.store_timeout
    }
}

/// Create a new session token for the auth cookie.
///
/// # Errors
/// Returns an error if the OS entropy source fails.
pub fn generate_session_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch storage.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            sessions,
            credentials,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Persist a new session for `account_id` and return its raw token.
    ///
    /// The token is returned only after the row is stored.
    ///
    /// # Errors
    /// Returns [`AuthError::StoreUnavailable`] if the row cannot be written.
    #[instrument(skip(self))]
    pub async fn issue(&self, account_id: AccountId) -> Result<String, AuthError> {
        for attempt in 1..=ISSUE_ATTEMPTS {
            let token = generate_session_token().map_err(AuthError::StoreUnavailable)?;
            let created_at = self.clock.now();
            let expires_at = created_at
                .checked_add_signed(self.config.ttl)
                .ok_or_else(|| {
                    AuthError::StoreUnavailable(anyhow!("session expiry out of range"))
                })?;
            let session = NewSession {
                token_hash: hash_session_token(&token),
                account_id,
                created_at,
                expires_at,
            };

            match self.bounded(self.sessions.insert(session)).await {
                Ok(()) => {
                    debug!("session issued");
                    return Ok(token);
                }
                Err(StoreError::Conflict) => {
                    warn!(attempt, "session token collision, retrying");
                }
                Err(StoreError::Backend(err)) => return Err(AuthError::StoreUnavailable(err)),
            }
        }

        Err(AuthError::StoreUnavailable(anyhow!(
            "session token collided {ISSUE_ATTEMPTS} times"
        )))
    }

    /// Resolve `token` into a principal carrying the account's current role.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidSession`] for unknown or expired tokens and
    /// for sessions whose account no longer exists, or
    /// [`AuthError::StoreUnavailable`] on storage failure or timeout.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        let token_hash = hash_session_token(token);

        let Some(record) = self
            .bounded(self.sessions.find(&token_hash))
            .await
            .map_err(store_unavailable)?
        else {
            return Err(AuthError::InvalidSession);
        };

        let now = self.clock.now();
        if now >= record.expires_at {
            debug!(expires_at = %record.expires_at, "session expired");
            return Err(AuthError::InvalidSession);
        }

        let Some(account) = self
            .bounded(self.credentials.find_by_id(record.account_id))
            .await
            .map_err(store_unavailable)?
        else {
            warn!(account_id = %record.account_id, "session names a missing account");
            return Err(AuthError::InvalidSession);
        };

        // last_seen_at is informational; a failed touch does not invalidate.
        if let Err(err) = self.bounded(self.sessions.touch(&token_hash, now)).await {
            warn!("Failed to update session activity: {err}");
        }

        Ok(account.principal())
    }

    /// Delete the session behind `token`. Unknown, expired and already
    /// revoked tokens are a no-op.
    ///
    /// # Errors
    /// Returns [`AuthError::StoreUnavailable`] on storage failure or timeout.
    #[instrument(skip_all)]
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let token_hash = hash_session_token(token);
        self.bounded(self.sessions.delete(&token_hash))
            .await
            .map_err(store_unavailable)
    }

    /// Remove sessions whose expiry has passed.
    ///
    /// # Errors
    /// Returns [`AuthError::StoreUnavailable`] on storage failure or timeout.
    pub async fn reap_expired(&self) -> Result<u64, AuthError> {
        let now = self.clock.now();
        self.bounded(self.sessions.delete_expired(now))
            .await
            .map_err(store_unavailable)
    }

    pub(crate) async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        bounded(self.config.store_timeout, call).await
    }
}

/// Run a store call under `limit`; an elapsed timer is a backend failure.
pub(crate) async fn bounded<T, F>(limit: StdDuration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Backend(anyhow!("store call exceeded {}ms", limit.as_millis())))?
}

pub(crate) fn store_unavailable(err: StoreError) -> AuthError {
    match err {
        StoreError::Conflict => AuthError::StoreUnavailable(anyhow!("unexpected unique conflict")),
        StoreError::Backend(err) => AuthError::StoreUnavailable(err),
    }
}

/// Periodically delete expired sessions. Returns `None` when `interval` is zero.
pub fn spawn_session_reaper(
    manager: SessionManager,
    interval: StdDuration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        info!("Session reaper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match manager.reap_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Reaped expired sessions"),
                Err(err) => error!("Failed to reap expired sessions: {err:?}"),
            }
        }
    }))
}
