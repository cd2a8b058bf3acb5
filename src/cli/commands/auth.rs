use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command};

use crate::auth::session::MAX_SESSION_TTL_SECONDS;

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_STORE_TIMEOUT_MS: &str = "store-timeout-ms";
pub const ARG_SESSION_REAP_SECONDS: &str = "session-reap-seconds";

/// Session and cookie settings shared by every login path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub store_timeout_ms: u64,
    pub session_reap_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the TTL is not within one second and one year, or
    /// the store timeout is zero.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .unwrap_or_else(|| "http://localhost:3000".to_string());
        let session_ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(600);
        let store_timeout_ms = matches
            .get_one::<u64>(ARG_STORE_TIMEOUT_MS)
            .copied()
            .unwrap_or(3000);
        let session_reap_seconds = matches
            .get_one::<u64>(ARG_SESSION_REAP_SECONDS)
            .copied()
            .unwrap_or(300);

        if !(1..=MAX_SESSION_TTL_SECONDS).contains(&session_ttl_seconds) {
            bail!(
                "--{ARG_SESSION_TTL_SECONDS} must be between 1 and {MAX_SESSION_TTL_SECONDS}"
            );
        }
        if store_timeout_ms == 0 {
            bail!("--{ARG_STORE_TIMEOUT_MS} must be greater than zero");
        }

        Ok(Self {
            frontend_base_url,
            session_ttl_seconds,
            store_timeout_ms,
            session_reap_seconds,
        })
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend origin allowed by CORS; also decides the Secure cookie flag")
                .env("COURSEGATE_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Absolute session lifetime in seconds")
                .env("COURSEGATE_SESSION_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT_MS)
                .long(ARG_STORE_TIMEOUT_MS)
                .help("Upper bound for a single store call in milliseconds")
                .env("COURSEGATE_STORE_TIMEOUT_MS")
                .default_value("3000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SESSION_REAP_SECONDS)
                .long(ARG_SESSION_REAP_SECONDS)
                .help("Interval for deleting expired sessions, 0 disables")
                .env("COURSEGATE_SESSION_REAP_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}
