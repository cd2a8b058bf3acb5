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
    types::{CredentialsRequest, ErrorResponse, LoginResponse},
};
use crate::auth::{AuthError, Credentials};

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CredentialsRequest>>,
) -> Response {
    // A malformed body gets the same answer as a wrong password.
    let Some(Json(request)) = payload else {
        return AuthError::AuthFailure.into_response();
    };

    let credentials = Credentials::Local {
        identity: request.identity,
        password: SecretString::from(request.password),
    };
    let outcome = match auth_state.authenticator().login(credentials).await {
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

    let body = LoginResponse {
        success: true,
        principal: outcome.principal,
    };
    (StatusCode::OK, headers, Json(body)).into_response()
}
