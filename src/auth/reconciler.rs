//! Map a federated identity claim onto a local account.

use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument};

use super::{
    account::{Account, normalize_identity},
    error::AuthError,
    password::FEDERATED_ONLY_DIGEST,
    session::{bounded, store_unavailable},
    store::{CredentialStore, StoreError},
};

/// An identity the provider has vouched for. Consumed by [`IdentityReconciler::reconcile`].
#[derive(Debug, PartialEq, Eq)]
pub struct FederatedAssertion {
    identity: String,
    provider: String,
    subject: String,
}

impl FederatedAssertion {
    #[must_use]
    pub fn new(
        identity: impl AsRef<str>,
        provider: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            identity: normalize_identity(identity.as_ref()),
            provider: provider.into(),
            subject: subject.into(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[derive(Clone)]
pub struct IdentityReconciler {
    credentials: Arc<dyn CredentialStore>,
    store_timeout: Duration,
}

impl IdentityReconciler {
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialStore>, store_timeout: Duration) -> Self {
        Self {
            credentials,
            store_timeout,
        }
    }

    /// Find the account for `assertion`, creating a federated-only one if absent.
    ///
    /// Existing accounts are returned unchanged. A concurrent create for the
    /// same identity is resolved by re-reading the winner's row.
    ///
    /// # Errors
    /// Returns [`AuthError::Validation`] for an empty identity, or
    /// [`AuthError::StoreUnavailable`] on storage failure or timeout.
    #[instrument(skip_all, fields(identity = %assertion.identity, provider = %assertion.provider))]
    pub async fn reconcile(&self, assertion: FederatedAssertion) -> Result<Account, AuthError> {
        if assertion.identity.is_empty() {
            return Err(AuthError::Validation("Missing identity".to_string()));
        }

        if let Some(account) = self.find(&assertion.identity).await? {
            debug!("federated identity matched existing account");
            return Ok(account);
        }

        let created = bounded(
            self.store_timeout,
            self.credentials
                .create(&assertion.identity, Some(FEDERATED_ONLY_DIGEST)),
        )
        .await;

        match created {
            Ok(account) => {
                info!(account_id = %account.id, "created federated-only account");
                Ok(account)
            }
            Err(StoreError::Conflict) => self.find(&assertion.identity).await?.ok_or_else(|| {
                AuthError::StoreUnavailable(anyhow::anyhow!(
                    "account vanished after identity conflict"
                ))
            }),
            Err(err) => Err(store_unavailable(err)),
        }
    }

    async fn find(&self, identity: &str) -> Result<Option<Account>, AuthError> {
        bounded(self.store_timeout, self.credentials.find_by_identity(identity))
            .await
            .map_err(store_unavailable)
    }
}
