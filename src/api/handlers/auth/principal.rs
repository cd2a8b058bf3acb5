//! Route guards for protected endpoints.
//!
//! Flow Overview: read the session token, run the authorization gate for the
//! route's tier, and on allow insert the resolved [`Principal`] into the
//! request extensions so the handler receives it as `Extension<Principal>`.
//! On deny the handler never runs.

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{session::extract_session_token, state::AuthState};
use crate::auth::{AuthError, Decision, Principal, Tier};

pub async fn require_authenticated(
    auth_state: Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    require_tier(&auth_state, Tier::Authenticated, request, next).await
}

pub async fn require_admin(
    auth_state: Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    require_tier(&auth_state, Tier::Admin, request, next).await
}

async fn require_tier(
    auth_state: &AuthState,
    required: Tier,
    mut request: Request,
    next: Next,
) -> Response {
    let token = extract_session_token(request.headers());
    match auth_state.gate().authorize(token.as_deref(), required).await {
        Decision::Allow(principal) => {
            if let Some(principal) = principal {
                request.extensions_mut().insert::<Principal>(principal);
            }
            next.run(request).await
        }
        Decision::Deny(reason) => AuthError::from(reason).into_response(),
    }
}
