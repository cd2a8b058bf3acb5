//! Google sign-in: redirect out, then reconcile the identity on the way back.
//!
//! `state` and the PKCE verifier live in short-lived `HttpOnly` cookies
//! scoped to `/auth/google` between the two requests. Every failure on the
//! callback leg ends in a redirect to the configured failure location.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::IntoParams;

use super::{
    session::{read_cookie, session_cookie},
    state::AuthState,
};

const OAUTH_STATE_COOKIE: &str = "coursegate_oauth_state";
const OAUTH_VERIFIER_COOKIE: &str = "coursegate_oauth_verifier";
const OAUTH_COOKIE_PATH: &str = "/auth/google";
const OAUTH_COOKIE_TTL_SECONDS: u32 = 300;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/google",
    responses(
        (status = 303, description = "Redirect to the identity provider, or to the failure location when sign-in is not configured")
    ),
    tag = "auth"
)]
pub async fn google(auth_state: Extension<Arc<AuthState>>) -> Response {
    let Some(client) = auth_state.oauth() else {
        warn!("Federated login requested but OAuth is not configured");
        return Redirect::to(auth_state.config().failure_redirect()).into_response();
    };

    let request = client.authorization_url();
    let secure = auth_state.config().session_cookie_secure();

    let mut headers = HeaderMap::new();
    for (name, value) in [
        (OAUTH_STATE_COOKIE, request.state.as_str()),
        (OAUTH_VERIFIER_COOKIE, request.code_verifier.as_str()),
    ] {
        match transient_cookie(name, value, OAUTH_COOKIE_TTL_SECONDS, secure) {
            Ok(cookie) => {
                headers.append(SET_COOKIE, cookie);
            }
            Err(err) => {
                error!("Failed to build OAuth cookie: {err}");
                return Redirect::to(auth_state.config().failure_redirect()).into_response();
            }
        }
    }

    (headers, Redirect::to(&request.url)).into_response()
}

#[utoipa::path(
    get,
    path = "/auth/google/callback",
    params(CallbackParams),
    responses(
        (status = 303, description = "Redirect to the success location with a session cookie, or to the failure location")
    ),
    tag = "auth"
)]
pub async fn google_callback(
    headers: HeaderMap,
    params: Query<CallbackParams>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let config = auth_state.config();
    let secure = config.session_cookie_secure();

    // Transient cookies are single-use whatever the outcome.
    let mut response_headers = HeaderMap::new();
    for name in [OAUTH_STATE_COOKIE, OAUTH_VERIFIER_COOKIE] {
        if let Ok(cookie) = transient_cookie(name, "", 0, secure) {
            response_headers.append(SET_COOKIE, cookie);
        }
    }
    let failure = |response_headers: HeaderMap, reason: &str| {
        warn!(reason, "Federated login failed");
        (response_headers, Redirect::to(config.failure_redirect())).into_response()
    };

    let Some(client) = auth_state.oauth() else {
        return failure(response_headers, "oauth_not_configured");
    };
    if let Some(provider_error) = params.error.as_deref() {
        warn!(provider_error, "Provider returned an error");
        return failure(response_headers, "provider_error");
    }
    let Some(code) = params.code.as_deref() else {
        return failure(response_headers, "missing_code");
    };

    let stored_state = read_cookie(&headers, OAUTH_STATE_COOKIE);
    match (params.state.as_deref(), stored_state.as_deref()) {
        (Some(received), Some(stored)) if !stored.is_empty() && received == stored => {}
        _ => return failure(response_headers, "state_mismatch"),
    }
    let Some(code_verifier) =
        read_cookie(&headers, OAUTH_VERIFIER_COOKIE).filter(|verifier| !verifier.is_empty())
    else {
        return failure(response_headers, "missing_verifier");
    };

    let assertion = match client.assertion(code, &code_verifier).await {
        Ok(assertion) => assertion,
        Err(err) => {
            error!("Federated identity exchange failed: {err}");
            return failure(response_headers, "exchange_failed");
        }
    };

    let outcome = match auth_state.authenticator().login_federated(assertion).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Federated login failed: {err:?}");
            return failure(response_headers, "login_failed");
        }
    };

    match session_cookie(config, &outcome.token) {
        Ok(cookie) => {
            response_headers.append(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return failure(response_headers, "cookie_failed");
        }
    }

    info!(account_id = %outcome.principal.account_id, "Federated login succeeded");
    (response_headers, Redirect::to(config.success_redirect())).into_response()
}

fn transient_cookie(
    name: &str,
    value: &str,
    max_age: u32,
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!(
        "{name}={value}; Path={OAUTH_COOKIE_PATH}; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
