//! Capability tiers and the allow/deny decision.

use tracing::debug;

use super::{
    account::{Principal, Role},
    error::AuthError,
    session::SessionManager,
};

/// Minimum standing required to reach a capability. Ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Anonymous,
    Authenticated,
    Admin,
}

impl Tier {
    /// Highest tier a principal with `role` satisfies.
    #[must_use]
    pub const fn granted_by(role: Role) -> Self {
        match role {
            Role::User => Self::Authenticated,
            Role::Admin => Self::Admin,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    NoSession,
    InsufficientRole,
}

impl From<DenyReason> for AuthError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NoSession => Self::InvalidSession,
            DenyReason::InsufficientRole => Self::InsufficientRole,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The principal is `None` only for anonymous access without a session.
    Allow(Option<Principal>),
    Deny(DenyReason),
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    sessions: SessionManager,
}

impl AuthorizationGate {
    #[must_use]
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    /// Pure decision over a validation result. Any validation error,
    /// including storage failures, counts as no session.
    #[must_use]
    pub fn decide(validation: Option<Result<Principal, AuthError>>, required: Tier) -> Decision {
        let principal = match validation {
            Some(Ok(principal)) => Some(principal),
            Some(Err(err)) => {
                if err.is_internal() {
                    tracing::error!("Session validation failed: {err:?}");
                }
                None
            }
            None => None,
        };

        match (principal, required) {
            (principal, Tier::Anonymous) => Decision::Allow(principal),
            (None, _) => Decision::Deny(DenyReason::NoSession),
            (Some(principal), required) if Tier::granted_by(principal.role) >= required => {
                Decision::Allow(Some(principal))
            }
            (Some(principal), _) => {
                debug!(account_id = %principal.account_id, ?required, "role below required tier");
                Decision::Deny(DenyReason::InsufficientRole)
            }
        }
    }

    /// Resolve `token` and decide whether it reaches `required`.
    pub async fn authorize(&self, token: Option<&str>, required: Tier) -> Decision {
        let validation = match token {
            Some(token) => Some(self.sessions.validate(token).await),
            None => None,
        };
        Self::decide(validation, required)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::{
        session::SessionConfig,
        store::{CredentialStore, MemoryStore},
    };
    use std::sync::Arc;
    use uuid::Uuid;

    fn principal(role: Role) -> Principal {
        Principal {
            account_id: Uuid::nil(),
            identity: "a@x.com".to_string(),
            role,
        }
    }

    #[test]
    fn tiers_are_totally_ordered() {
        assert!(Tier::Anonymous < Tier::Authenticated);
        assert!(Tier::Authenticated < Tier::Admin);
    }

    #[test]
    fn decide_covers_every_tier() {
        let user = || Some(Ok(principal(Role::User)));
        let admin = || Some(Ok(principal(Role::Admin)));

        assert_eq!(
            AuthorizationGate::decide(None, Tier::Anonymous),
            Decision::Allow(None)
        );
        assert_eq!(
            AuthorizationGate::decide(None, Tier::Authenticated),
            Decision::Deny(DenyReason::NoSession)
        );
        assert_eq!(
            AuthorizationGate::decide(user(), Tier::Authenticated),
            Decision::Allow(Some(principal(Role::User)))
        );
        assert_eq!(
            AuthorizationGate::decide(user(), Tier::Admin),
            Decision::Deny(DenyReason::InsufficientRole)
        );
        assert!(AuthorizationGate::decide(admin(), Tier::Admin).is_allowed());
        assert!(AuthorizationGate::decide(admin(), Tier::Authenticated).is_allowed());
    }

    #[test]
    fn validation_errors_deny_as_no_session() {
        for err in [
            AuthError::InvalidSession,
            AuthError::StoreUnavailable(anyhow::anyhow!("timeout")),
        ] {
            assert_eq!(
                AuthorizationGate::decide(Some(Err(err)), Tier::Authenticated),
                Decision::Deny(DenyReason::NoSession)
            );
        }
    }

    #[tokio::test]
    async fn authorize_admin_endpoint() {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionManager::new(store.clone(), store.clone(), SessionConfig::new());
        let gate = AuthorizationGate::new(sessions.clone());

        let user = store.create("u@x.com", None).await.unwrap();
        let admin = store.create("root@x.com", None).await.unwrap();
        store.set_role(admin.id, Role::Admin).await.unwrap();
        let user_token = sessions.issue(user.id).await.unwrap();
        let admin_token = sessions.issue(admin.id).await.unwrap();

        assert_eq!(
            gate.authorize(None, Tier::Admin).await,
            Decision::Deny(DenyReason::NoSession)
        );
        assert_eq!(
            gate.authorize(Some(&user_token), Tier::Admin).await,
            Decision::Deny(DenyReason::InsufficientRole)
        );
        assert!(matches!(
            gate.authorize(Some(&admin_token), Tier::Admin).await,
            Decision::Allow(Some(principal)) if principal.account_id == admin.id
        ));
    }
}
