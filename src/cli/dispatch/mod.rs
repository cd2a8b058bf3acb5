//! Maps validated CLI matches to the action the binary executes.

use crate::auth::Role;
use crate::cli::actions::{Action, server, set_role};
use crate::cli::commands::{ARG_IDENTITY, ARG_ROLE, CMD_SET_ROLE, auth, oauth};
use anyhow::{Context, Result, anyhow};

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    if let Some(sub) = matches.subcommand_matches(CMD_SET_ROLE) {
        let identity = sub
            .get_one::<String>(ARG_IDENTITY)
            .cloned()
            .context("missing required argument: --identity")?;
        let role = sub
            .get_one::<String>(ARG_ROLE)
            .context("missing required argument: --role")?
            .parse::<Role>()
            .map_err(|err| anyhow!(err))?;

        return Ok(Action::SetRole(set_role::Args {
            dsn,
            identity,
            role,
        }));
    }

    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let auth_opts = auth::Options::parse(matches)?;
    let oauth_opts = oauth::Options::parse(matches)?;

    Ok(Action::Server(server::Args {
        port,
        dsn,
        frontend_base_url: auth_opts.frontend_base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        store_timeout_ms: auth_opts.store_timeout_ms,
        session_reap_seconds: auth_opts.session_reap_seconds,
        oauth_client_id: oauth_opts.client_id,
        oauth_client_secret: oauth_opts.client_secret,
        oauth_redirect_uri: oauth_opts.redirect_uri,
        oauth_auth_url: oauth_opts.auth_url,
        oauth_token_url: oauth_opts.token_url,
        oauth_userinfo_url: oauth_opts.userinfo_url,
        oauth_scopes: oauth_opts.scopes,
        oauth_timeout_ms: oauth_opts.timeout_ms,
        oauth_success_redirect: oauth_opts.success_redirect,
        oauth_failure_redirect: oauth_opts.failure_redirect,
    }))
}
