use super::auth::AuthState;
use crate::{GIT_COMMIT_HASH, auth::session::bounded};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Database is healthy", body = [Health]),
        (status = 503, description = "Database is unhealthy", body = [Health])
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let store_timeout = auth_state.sessions().config().store_timeout();
    let result = bounded(store_timeout, auth_state.credentials().ping()).await;
    if let Err(error) = &result {
        error!("Failed to ping database: {error:?}");
    }

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    // Create headers using the map method
    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();

            headers.insert("X-App", x_app_header_value);

            headers
        })
        .map_err(|err| {
            error!("Failed to parse X-App header: {}", err);
        });

    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    if result.is_ok() {
        debug!("Database connection is healthy");
        (StatusCode::OK, headers, body)
    } else {
        debug!("Database connection is unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}
