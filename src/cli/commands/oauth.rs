use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_OAUTH_CLIENT_ID: &str = "oauth-client-id";
pub const ARG_OAUTH_CLIENT_SECRET: &str = "oauth-client-secret";
pub const ARG_OAUTH_REDIRECT_URI: &str = "oauth-redirect-uri";
pub const ARG_OAUTH_AUTH_URL: &str = "oauth-auth-url";
pub const ARG_OAUTH_TOKEN_URL: &str = "oauth-token-url";
pub const ARG_OAUTH_USERINFO_URL: &str = "oauth-userinfo-url";
pub const ARG_OAUTH_SCOPES: &str = "oauth-scopes";
pub const ARG_OAUTH_TIMEOUT_MS: &str = "oauth-timeout-ms";
pub const ARG_OAUTH_SUCCESS_REDIRECT: &str = "oauth-success-redirect";
pub const ARG_OAUTH_FAILURE_REDIRECT: &str = "oauth-failure-redirect";

/// Federated login settings. The client is only set up when both the id and
/// the secret are present.
#[derive(Debug, Clone)]
pub struct Options {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub redirect_uri: String,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
    pub scopes: Vec<String>,
    pub timeout_ms: u64,
    pub success_redirect: String,
    pub failure_redirect: String,
}

impl Options {
    /// # Errors
    /// Returns an error if the provider timeout is zero.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let string = |id: &str| matches.get_one::<String>(id).cloned();

        let timeout_ms = matches
            .get_one::<u64>(ARG_OAUTH_TIMEOUT_MS)
            .copied()
            .unwrap_or(5000);
        if timeout_ms == 0 {
            bail!("--{ARG_OAUTH_TIMEOUT_MS} must be greater than zero");
        }

        Ok(Self {
            client_id: string(ARG_OAUTH_CLIENT_ID),
            client_secret: string(ARG_OAUTH_CLIENT_SECRET).map(SecretString::from),
            redirect_uri: string(ARG_OAUTH_REDIRECT_URI)
                .unwrap_or_else(|| "http://localhost:8080/auth/google/callback".to_string()),
            auth_url: string(ARG_OAUTH_AUTH_URL),
            token_url: string(ARG_OAUTH_TOKEN_URL),
            userinfo_url: string(ARG_OAUTH_USERINFO_URL),
            scopes: matches
                .get_many::<String>(ARG_OAUTH_SCOPES)
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            timeout_ms,
            success_redirect: string(ARG_OAUTH_SUCCESS_REDIRECT)
                .unwrap_or_else(|| "http://localhost:3000?success=true".to_string()),
            failure_redirect: string(ARG_OAUTH_FAILURE_REDIRECT)
                .unwrap_or_else(|| "http://localhost:3000?error=google".to_string()),
        })
    }
}

pub fn with_args(command: Command) -> Command {
    let command = with_client_args(command);
    with_redirect_args(command)
}

fn with_client_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OAUTH_CLIENT_ID)
                .long(ARG_OAUTH_CLIENT_ID)
                .help("Google OAuth client id; federated login is off without it")
                .env("COURSEGATE_OAUTH_CLIENT_ID")
                .requires(ARG_OAUTH_CLIENT_SECRET),
        )
        .arg(
            Arg::new(ARG_OAUTH_CLIENT_SECRET)
                .long(ARG_OAUTH_CLIENT_SECRET)
                .help("Google OAuth client secret")
                .env("COURSEGATE_OAUTH_CLIENT_SECRET")
                .hide_env_values(true)
                .requires(ARG_OAUTH_CLIENT_ID),
        )
        .arg(
            Arg::new(ARG_OAUTH_REDIRECT_URI)
                .long(ARG_OAUTH_REDIRECT_URI)
                .help("Callback URL registered with the provider")
                .env("COURSEGATE_OAUTH_REDIRECT_URI")
                .default_value("http://localhost:8080/auth/google/callback"),
        )
        .arg(
            Arg::new(ARG_OAUTH_AUTH_URL)
                .long(ARG_OAUTH_AUTH_URL)
                .help("Override the provider authorization endpoint")
                .env("COURSEGATE_OAUTH_AUTH_URL"),
        )
        .arg(
            Arg::new(ARG_OAUTH_TOKEN_URL)
                .long(ARG_OAUTH_TOKEN_URL)
                .help("Override the provider token endpoint")
                .env("COURSEGATE_OAUTH_TOKEN_URL"),
        )
        .arg(
            Arg::new(ARG_OAUTH_USERINFO_URL)
                .long(ARG_OAUTH_USERINFO_URL)
                .help("Override the provider userinfo endpoint")
                .env("COURSEGATE_OAUTH_USERINFO_URL"),
        )
        .arg(
            Arg::new(ARG_OAUTH_SCOPES)
                .long(ARG_OAUTH_SCOPES)
                .help("Comma separated scopes to request")
                .env("COURSEGATE_OAUTH_SCOPES")
                .value_delimiter(',')
                .default_value("profile,email"),
        )
        .arg(
            Arg::new(ARG_OAUTH_TIMEOUT_MS)
                .long(ARG_OAUTH_TIMEOUT_MS)
                .help("Upper bound for a single provider call in milliseconds")
                .env("COURSEGATE_OAUTH_TIMEOUT_MS")
                .default_value("5000")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_redirect_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OAUTH_SUCCESS_REDIRECT)
                .long(ARG_OAUTH_SUCCESS_REDIRECT)
                .help("Where to send the browser after a federated login")
                .env("COURSEGATE_OAUTH_SUCCESS_REDIRECT")
                .default_value("http://localhost:3000?success=true"),
        )
        .arg(
            Arg::new(ARG_OAUTH_FAILURE_REDIRECT)
                .long(ARG_OAUTH_FAILURE_REDIRECT)
                .help("Where to send the browser when a federated login fails")
                .env("COURSEGATE_OAUTH_FAILURE_REDIRECT")
                .default_value("http://localhost:3000?error=google"),
        )
}
