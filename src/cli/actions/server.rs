use crate::{
    api::{self, AuthConfig, ServerConfig},
    auth::SessionConfig,
    cli::telemetry,
    oauth::OAuthConfig,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub store_timeout_ms: u64,
    pub session_reap_seconds: u64,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<SecretString>,
    pub oauth_redirect_uri: String,
    pub oauth_auth_url: Option<String>,
    pub oauth_token_url: Option<String>,
    pub oauth_userinfo_url: Option<String>,
    pub oauth_scopes: Vec<String>,
    pub oauth_timeout_ms: u64,
    pub oauth_success_redirect: String,
    pub oauth_failure_redirect: String,
}

impl Args {
    /// Translate CLI arguments into the server configuration.
    ///
    /// # Errors
    /// Returns an error if an OAuth URL is malformed.
    pub fn server_config(self) -> Result<ServerConfig> {
        let auth = AuthConfig::new(self.frontend_base_url)
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_success_redirect(self.oauth_success_redirect)
            .with_failure_redirect(self.oauth_failure_redirect);

        let session = SessionConfig::new()
            .with_ttl_seconds(self.session_ttl_seconds)
            .with_store_timeout(Duration::from_millis(self.store_timeout_ms));

        let oauth = match (self.oauth_client_id, self.oauth_client_secret) {
            (Some(client_id), Some(client_secret)) => {
                let mut config =
                    OAuthConfig::google(client_id, client_secret, &self.oauth_redirect_uri)
                        .context("Invalid --oauth-redirect-uri")?;
                if let Some(url) = self.oauth_auth_url {
                    config = config
                        .with_auth_url(Url::parse(&url).context("Invalid --oauth-auth-url")?);
                }
                if let Some(url) = self.oauth_token_url {
                    config = config
                        .with_token_url(Url::parse(&url).context("Invalid --oauth-token-url")?);
                }
                if let Some(url) = self.oauth_userinfo_url {
                    config = config.with_userinfo_url(
                        Url::parse(&url).context("Invalid --oauth-userinfo-url")?,
                    );
                }
                if !self.oauth_scopes.is_empty() {
                    config = config.with_scopes(self.oauth_scopes);
                }
                Some(config.with_request_timeout(Duration::from_millis(self.oauth_timeout_ms)))
            }
            _ => None,
        };

        Ok(ServerConfig {
            port: self.port,
            auth,
            session,
            reap_interval: Duration::from_secs(self.session_reap_seconds),
            oauth,
        })
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let dsn = args.dsn.clone();
    let config = args.server_config()?;
    debug!(
        port = config.port,
        oauth = config.oauth.is_some(),
        "Starting server"
    );

    let result = api::new(dsn, config).await;

    telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 8080,
            dsn: "postgres://localhost/coursegate".to_string(),
            frontend_base_url: "https://courses.example.com".to_string(),
            session_ttl_seconds: 900,
            store_timeout_ms: 1500,
            session_reap_seconds: 0,
            oauth_client_id: None,
            oauth_client_secret: None,
            oauth_redirect_uri: "http://localhost:8080/auth/google/callback".to_string(),
            oauth_auth_url: None,
            oauth_token_url: None,
            oauth_userinfo_url: None,
            oauth_scopes: vec!["profile".to_string(), "email".to_string()],
            oauth_timeout_ms: 2500,
            oauth_success_redirect: "https://courses.example.com/?success=true".to_string(),
            oauth_failure_redirect: "https://courses.example.com/?error=google".to_string(),
        }
    }

    #[test]
    fn server_config_without_oauth() {
        let config = args().server_config().ok();
        assert!(config.is_some());
        if let Some(config) = config {
            assert!(config.oauth.is_none());
            assert_eq!(config.session.ttl_seconds(), 900);
            assert_eq!(config.session.store_timeout(), Duration::from_millis(1500));
            assert_eq!(config.auth.session_ttl_seconds(), 900);
            assert_eq!(
                config.auth.failure_redirect(),
                "https://courses.example.com/?error=google"
            );
            assert!(config.reap_interval.is_zero());
        }
    }

    #[test]
    fn server_config_with_oauth_overrides() {
        let mut args = args();
        args.oauth_client_id = Some("client".to_string());
        args.oauth_client_secret = Some(SecretString::from("secret".to_string()));
        args.oauth_auth_url = Some("http://127.0.0.1:9000/authorize".to_string());

        let config = args.server_config().ok();
        let oauth = config.and_then(|config| config.oauth);
        assert!(oauth.is_some());
        if let Some(oauth) = oauth {
            assert_eq!(oauth.client_id(), "client");
            assert_eq!(oauth.auth_url().as_str(), "http://127.0.0.1:9000/authorize");
            assert_eq!(oauth.scopes(), ["profile".to_string(), "email".to_string()]);
            assert_eq!(oauth.request_timeout(), Duration::from_millis(2500));
        }
    }

    #[test]
    fn server_config_rejects_bad_oauth_url() {
        let mut args = args();
        args.oauth_client_id = Some("client".to_string());
        args.oauth_client_secret = Some(SecretString::from("secret".to_string()));
        args.oauth_token_url = Some("not a url".to_string());

        assert!(args.server_config().is_err());
    }
}
