//! OAuth 2.0 authorization-code flow with PKCE against an external identity
//! provider. Defaults target Google.
//!
//! The flow is split in two so the HTTP layer can park `state` and the code
//! verifier in short-lived cookies between the redirect and the callback.

pub mod pkce;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::auth::FederatedAssertion;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
pub const DEFAULT_SCOPES: &[&str] = &["profile", "email"];
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("invalid OAuth URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{operation} failed with status {status}")]
    Provider {
        operation: &'static str,
        status: u16,
        detail: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider did not return a verified email")]
    UnverifiedIdentity,
}

#[derive(Clone, Debug)]
pub struct OAuthConfig {
    provider: String,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: Url,
    auth_url: Url,
    token_url: Url,
    userinfo_url: Url,
    scopes: Vec<String>,
    request_timeout: Duration,
}

impl OAuthConfig {
    /// Google endpoints with `profile` and `email` scopes.
    ///
    /// # Errors
    /// Returns an error if `redirect_uri` is not a valid URL.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: SecretString,
        redirect_uri: &str,
    ) -> Result<Self, OAuthError> {
        Ok(Self {
            provider: "google".to_string(),
            client_id: client_id.into(),
            client_secret,
            redirect_uri: Url::parse(redirect_uri)?,
            auth_url: Url::parse(GOOGLE_AUTH_URL)?,
            token_url: Url::parse(GOOGLE_TOKEN_URL)?,
            userinfo_url: Url::parse(GOOGLE_USERINFO_URL)?,
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    #[must_use]
    pub fn with_userinfo_url(mut self, url: Url) -> Self {
        self.userinfo_url = url;
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        if !scopes.is_empty() {
            self.scopes = scopes;
        }
        self
    }

    /// Deadline for each call to the token and userinfo endpoints,
    /// connect included.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.request_timeout = timeout;
        }
        self
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Redirect target plus the values to keep until the callback.
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
}

impl UserInfo {
    /// Turn the profile into an assertion. Requires an email that the
    /// provider did not mark as unverified.
    ///
    /// # Errors
    /// Returns [`OAuthError::UnverifiedIdentity`] otherwise.
    pub fn into_assertion(self, provider: &str) -> Result<FederatedAssertion, OAuthError> {
        if self.email_verified == Some(false) {
            return Err(OAuthError::UnverifiedIdentity);
        }
        match self.email {
            Some(email) if !email.trim().is_empty() => {
                Ok(FederatedAssertion::new(email, provider, self.sub))
            }
            _ => Err(OAuthError::UnverifiedIdentity),
        }
    }
}

#[derive(Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client, e.g. one carrying the service user agent.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    #[must_use]
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let state = pkce::generate_state();
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::generate_code_challenge(&code_verifier);
        let scope = self.config.scopes.join(" ");

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("state", &state)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("scope", &scope);

        AuthorizationRequest {
            url: url.into(),
            state,
            code_verifier,
        }
    }

    /// # Errors
    /// Returns [`OAuthError::Http`] on network failure or timeout, or
    /// [`OAuthError::Provider`] on a non-2xx response.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let response = Self::ensure_success(response, "token exchange").await?;
        Ok(response.json::<TokenResponse>().await?)
    }

    /// # Errors
    /// Returns [`OAuthError::Http`] on network failure or timeout, or
    /// [`OAuthError::Provider`] on a non-2xx response.
    #[instrument(skip_all)]
    pub async fn user_info(&self, access_token: &str) -> Result<UserInfo, OAuthError> {
        let response = self
            .http
            .get(self.config.userinfo_url.clone())
            .bearer_auth(access_token)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let response = Self::ensure_success(response, "userinfo request").await?;
        Ok(response.json::<UserInfo>().await?)
    }

    /// Exchange `code` and fetch the profile it grants access to.
    ///
    /// # Errors
    /// Any provider failure, or a profile without a usable email.
    pub async fn assertion(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<FederatedAssertion, OAuthError> {
        let token = self.exchange_code(code, code_verifier).await?;
        let profile = self.user_info(&token.access_token).await?;
        debug!(sub = %profile.sub, "fetched provider profile");
        profile.into_assertion(&self.config.provider)
    }

    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, OAuthError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        Err(OAuthError::Provider {
            operation,
            status,
            detail,
        })
    }
}
