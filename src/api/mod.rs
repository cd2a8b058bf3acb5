use crate::{
    APP_USER_AGENT,
    api::handlers::{auth, health},
    auth::{
        Authenticator, CredentialStore, PasswordHasher, PgStore, SessionConfig, SessionManager,
        SessionStore, spawn_session_reaper,
    },
    oauth::{OAuthClient, OAuthConfig},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::options,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use handlers::auth::{AuthConfig, AuthState, SESSION_COOKIE_NAME};
pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Everything the server needs besides the database DSN.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub reap_interval: Duration,
    pub oauth: Option<OAuthConfig>,
}

/// Assemble the full application around `auth_state`.
///
/// # Errors
/// Returns an error if the frontend base URL cannot be turned into a CORS origin.
pub fn app(auth_state: Arc<AuthState>) -> Result<Router> {
    let frontend_origin = frontend_origin(auth_state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    // Build the router from OpenAPI-wired routes, then extend it with the
    // preflight-only `OPTIONS /health`.
    let (router, _openapi) = router().split_for_parts();
    let app = router.route("/health", options(health::health)).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(Extension(auth_state)),
    );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(dsn: String, config: ServerConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool));
    store
        .ensure_session_schema()
        .await
        .context("Failed to provision session storage")?;

    let credentials: Arc<dyn CredentialStore> = store.clone();
    let sessions: Arc<dyn SessionStore> = store;
    let session_manager = SessionManager::new(sessions, credentials.clone(), config.session);
    let authenticator = Authenticator::new(
        credentials.clone(),
        PasswordHasher::default(),
        session_manager.clone(),
    );

    let oauth = match config.oauth {
        Some(oauth_config) => {
            let http = reqwest::Client::builder()
                .use_rustls_tls()
                .user_agent(APP_USER_AGENT)
                .connect_timeout(oauth_config.request_timeout())
                .timeout(oauth_config.request_timeout())
                .build()
                .context("Failed to build OAuth HTTP client")?;
            info!(provider = oauth_config.provider(), "Federated login enabled");
            Some(OAuthClient::new(oauth_config).with_http_client(http))
        }
        None => {
            info!("Federated login disabled: no OAuth client configured");
            None
        }
    };

    let auth_state = Arc::new(
        auth::AuthState::new(config.auth, authenticator, credentials).with_oauth(oauth),
    );

    // Expiry is enforced on validation; the reaper only reclaims rows.
    let reaper = spawn_session_reaper(session_manager, config.reap_interval);

    let app = app(auth_state)?;

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    if let Some(reaper) = reaper {
        reaper.abort();
    }

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path_and_keeps_port() {
        let origin = frontend_origin("http://localhost:3000/courses?x=1").ok();
        assert_eq!(
            origin.as_ref().and_then(|value| value.to_str().ok()),
            Some("http://localhost:3000")
        );

        let origin = frontend_origin("https://courses.example.com/").ok();
        assert_eq!(
            origin.as_ref().and_then(|value| value.to_str().ok()),
            Some("https://courses.example.com")
        );
    }

    #[test]
    fn frontend_origin_rejects_invalid_url() {
        assert!(frontend_origin("not a url").is_err());
        assert!(frontend_origin("file:///tmp").is_err());
    }
}
