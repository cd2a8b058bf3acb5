use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{error, instrument};

use super::{
    session::session_cookie,
    state::AuthState,
    types::{CredentialsRequest, RegisterResponse, RegisteredUser},
};
use crate::auth::AuthError;

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created and logged in", body = RegisterResponse),
        (status = 400, description = "Invalid identity or password", body = super::types::ErrorResponse),
        (status = 409, description = "Identity already exists", body = super::types::ErrorResponse),
        (status = 500, description = "Internal server error", body = super::types::ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CredentialsRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::Validation("Missing payload".to_string()).into_response();
    };

    let password = SecretString::from(request.password);
    let outcome = match auth_state
        .authenticator()
        .register(&request.identity, &password)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    let mut headers = HeaderMap::new();
    match session_cookie(auth_state.config(), &outcome.token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }

    let body = RegisterResponse {
        message: "User registered successfully".to_string(),
        user: RegisteredUser {
            id: outcome.principal.account_id.to_string(),
            identity: outcome.principal.identity,
        },
    };
    (StatusCode::CREATED, headers, Json(body)).into_response()
}
