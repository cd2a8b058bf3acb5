//! Auth configuration and the shared per-process state handed to handlers.

use std::sync::Arc;

use crate::{
    auth::{Authenticator, AuthorizationGate, CredentialStore, SessionManager},
    oauth::OAuthClient,
};

const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SESSION_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_SUCCESS_REDIRECT: &str = "http://localhost:3000?success=true";
const DEFAULT_FAILURE_REDIRECT: &str = "http://localhost:3000?error=google";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    success_redirect: String,
    failure_redirect: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRONTEND_BASE_URL.to_string())
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            success_redirect: DEFAULT_SUCCESS_REDIRECT.to_string(),
            failure_redirect: DEFAULT_FAILURE_REDIRECT.to_string(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_success_redirect(mut self, url: String) -> Self {
        self.success_redirect = url;
        self
    }

    #[must_use]
    pub fn with_failure_redirect(mut self, url: String) -> Self {
        self.failure_redirect = url;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn success_redirect(&self) -> &str {
        &self.success_redirect
    }

    #[must_use]
    pub fn failure_redirect(&self) -> &str {
        &self.failure_redirect
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    authenticator: Authenticator,
    gate: AuthorizationGate,
    oauth: Option<OAuthClient>,
    credentials: Arc<dyn CredentialStore>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        authenticator: Authenticator,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let gate = AuthorizationGate::new(authenticator.sessions().clone());
        Self {
            config,
            authenticator,
            gate,
            oauth: None,
            credentials,
        }
    }

    #[must_use]
    pub fn with_oauth(mut self, oauth: Option<OAuthClient>) -> Self {
        self.oauth = oauth;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        self.authenticator.sessions()
    }

    #[must_use]
    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    #[must_use]
    pub fn oauth(&self) -> Option<&OAuthClient> {
        self.oauth.as_ref()
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }
}
