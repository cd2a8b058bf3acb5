//! Login and registration flows.
//!
//! Every successful flow ends by issuing a session; callers receive the
//! principal together with the raw token to hand back to the client.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    account::{Account, Principal, normalize_identity, validate_registration},
    error::AuthError,
    password::PasswordHasher,
    reconciler::{FederatedAssertion, IdentityReconciler},
    session::{SessionManager, store_unavailable},
    store::{CredentialStore, StoreError},
};

/// The ways a caller can prove who they are.
pub enum Credentials {
    Local {
        identity: String,
        password: SecretString,
    },
    Federated(FederatedAssertion),
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub principal: Principal,
    pub token: String,
}

#[derive(Clone)]
pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    reconciler: IdentityReconciler,
    sessions: SessionManager,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        sessions: SessionManager,
    ) -> Self {
        let reconciler =
            IdentityReconciler::new(credentials.clone(), sessions.config().store_timeout());
        Self {
            credentials,
            hasher,
            reconciler,
            sessions,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// # Errors
    /// See [`Self::login_local`] and [`Self::login_federated`].
    pub async fn login(&self, credentials: Credentials) -> Result<LoginOutcome, AuthError> {
        match credentials {
            Credentials::Local { identity, password } => {
                self.login_local(&identity, &password).await
            }
            Credentials::Federated(assertion) => self.login_federated(assertion).await,
        }
    }

    /// Check a password login.
    ///
    /// Unknown identity, wrong password and federated-only accounts all yield
    /// the same [`AuthError::AuthFailure`] after one Argon2 verification.
    ///
    /// # Errors
    /// Returns [`AuthError::AuthFailure`] on any credential mismatch, or an
    /// internal error if storage or hashing fails.
    #[instrument(skip(self, password))]
    pub async fn login_local(
        &self,
        identity: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome, AuthError> {
        let identity = normalize_identity(identity);
        let account = self.find_by_identity(&identity).await?;

        let digest = account
            .as_ref()
            .and_then(|account| account.password_hash.as_deref());
        let verified = self.hasher.verify(password, digest).await?;

        match account {
            Some(account) if verified => self.start_session(&account).await,
            _ => {
                debug!("local login rejected");
                Err(AuthError::AuthFailure)
            }
        }
    }

    /// Log in with an identity the provider already vouched for.
    ///
    /// # Errors
    /// Returns an internal error if storage fails.
    #[instrument(skip_all, fields(provider = %assertion.provider()))]
    pub async fn login_federated(
        &self,
        assertion: FederatedAssertion,
    ) -> Result<LoginOutcome, AuthError> {
        let account = self.reconciler.reconcile(assertion).await?;
        self.start_session(&account).await
    }

    /// Create a local account and log it in.
    ///
    /// # Errors
    /// Returns [`AuthError::Validation`] for malformed input,
    /// [`AuthError::DuplicateIdentity`] if the identity is taken, or an
    /// internal error if storage or hashing fails.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        identity: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome, AuthError> {
        let identity = validate_registration(identity, password.expose_secret())?;
        let digest = self.hasher.hash(password).await?;

        let created = self
            .sessions
            .bounded(self.credentials.create(&identity, Some(&digest)))
            .await;
        let account = match created {
            Ok(account) => account,
            Err(StoreError::Conflict) => return Err(AuthError::DuplicateIdentity),
            Err(err) => return Err(store_unavailable(err)),
        };

        info!(account_id = %account.id, "account registered");
        self.start_session(&account).await
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>, AuthError> {
        self.sessions
            .bounded(self.credentials.find_by_identity(identity))
            .await
            .map_err(store_unavailable)
    }

    async fn start_session(&self, account: &Account) -> Result<LoginOutcome, AuthError> {
        let token = self.sessions.issue(account.id).await?;
        Ok(LoginOutcome {
            principal: account.principal(),
            token,
        })
    }
}
