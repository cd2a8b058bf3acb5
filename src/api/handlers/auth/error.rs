use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use super::types::ErrorResponse;
use crate::auth::AuthError;

impl AuthError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateIdentity => StatusCode::CONFLICT,
            Self::AuthFailure | Self::InvalidSession => StatusCode::UNAUTHORIZED,
            Self::InsufficientRole => StatusCode::FORBIDDEN,
            Self::StoreUnavailable(_) | Self::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = if self.is_internal() {
            // Full cause chain goes to the log, never to the client.
            error!("Auth request failed: {self:?}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (self.status_code(), Json(ErrorResponse { error: message })).into_response()
    }
}
