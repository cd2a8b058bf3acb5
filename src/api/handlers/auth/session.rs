//! Session endpoints for cookie and bearer auth.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use super::{
    state::{AuthConfig, AuthState},
    types::{MessageResponse, StatusResponse},
};

pub const SESSION_COOKIE_NAME: &str = "coursegate_session";

#[utoipa::path(
    get,
    path = "/auth/status",
    responses(
        (status = 200, description = "Current authentication status", body = StatusResponse)
    ),
    tag = "auth"
)]
pub async fn status(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    // Missing, expired and unreadable sessions all report anonymous.
    let principal = match extract_session_token(&headers) {
        Some(token) => match auth_state.sessions().validate(&token).await {
            Ok(principal) => Some(principal),
            Err(err) => {
                if err.is_internal() {
                    error!("Failed to validate session: {err:?}");
                }
                None
            }
        },
        None => None,
    };

    let response = match principal {
        Some(principal) => StatusResponse {
            authenticated: true,
            identity: Some(principal.identity),
            role: Some(principal.role),
        },
        None => StatusResponse {
            authenticated: false,
            identity: None,
            role: None,
        },
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(err) = auth_state.sessions().revoke(&token).await {
            error!("Failed to delete session: {err:?}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        StatusCode::OK,
        response_headers,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    // Only mark cookies secure when the frontend is served over HTTPS.
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Bearer header wins over the cookie when both are present.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    read_cookie(headers, SESSION_COOKIE_NAME).filter(|token| !token.is_empty())
}

pub(crate) fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.trim() == name {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
