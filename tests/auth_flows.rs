//! End-to-end request flows against the assembled router.
//!
//! Everything runs in process: accounts and sessions live in the memory
//! backend, time comes from a manual clock, and the Google endpoints are
//! replaced by a small local provider.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use argon2::Params;
use axum::{
    Form, Json, Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use coursegate::{
    api::{self, AuthConfig, AuthState},
    auth::{
        Authenticator, CredentialStore, ManualClock, MemoryStore, PasswordHasher, Role,
        SessionConfig, SessionManager,
    },
    oauth::{OAuthClient, OAuthConfig},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};
use tokio::net::TcpListener;
use tower::ServiceExt;
use url::Url;

const SUCCESS_REDIRECT: &str = "http://localhost:3000?success=true";
const FAILURE_REDIRECT: &str = "http://localhost:3000?error=google";

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn harness(oauth: Option<OAuthClient>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let session_config = SessionConfig::new().with_ttl_seconds(600);
    let sessions = SessionManager::new(store.clone(), store.clone(), session_config)
        .with_clock(clock.clone());
    let hasher = PasswordHasher::with_params(Params::new(8, 1, 1, None).unwrap());
    let authenticator = Authenticator::new(store.clone(), hasher, sessions);

    let config = AuthConfig::new("http://localhost:3000".to_string())
        .with_session_ttl_seconds(600)
        .with_success_redirect(SUCCESS_REDIRECT.to_string())
        .with_failure_redirect(FAILURE_REDIRECT.to_string());
    let state = AuthState::new(config, authenticator, store.clone()).with_oauth(oauth);
    let app = api::app(Arc::new(state)).unwrap();

    Harness { app, store, clock }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Reply {
    fn session_token(&self) -> Option<String> {
        cookie_value(&self.headers, api::SESSION_COOKIE_NAME)
    }

    fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

async fn send(app: &Router, request: Request<Body>) -> Result<Reply> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    Ok(Reply {
        status,
        headers,
        body,
    })
}

async fn post_json(app: &Router, path: &str, body: &Value) -> Result<Reply> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?;
    send(app, request).await
}

async fn get_with_cookie(app: &Router, path: &str, token: Option<&str>) -> Result<Reply> {
    let mut builder = Request::builder().method(Method::GET).uri(path);
    if let Some(token) = token {
        builder = builder.header(
            header::COOKIE,
            format!("{}={token}", api::SESSION_COOKIE_NAME),
        );
    }
    send(app, builder.body(Body::empty())?).await
}

async fn register(app: &Router, identity: &str, password: &str) -> Result<Reply> {
    post_json(
        app,
        "/api/register",
        &json!({ "identity": identity, "password": password }),
    )
    .await
}

async fn login(app: &Router, identity: &str, password: &str) -> Result<Reply> {
    post_json(
        app,
        "/api/login",
        &json!({ "identity": identity, "password": password }),
    )
    .await
}

#[tokio::test]
async fn register_login_and_role_change_take_effect_immediately() -> Result<()> {
    let h = harness(None);

    let reply = register(&h.app, "Ada@Example.com", "password123").await?;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["user"]["identity"], "ada@example.com");
    assert!(reply.session_token().is_some());

    let reply = login(&h.app, "ada@example.com", "password124").await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body, json!({ "error": "invalid credentials" }));

    let reply = login(&h.app, " ADA@example.com ", "password123").await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["principal"]["role"], "user");
    let token = reply.session_token().expect("session cookie");

    let reply = get_with_cookie(&h.app, "/api/my-courses", Some(&token)).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["message"], "Welcome to My Courses!");

    let reply = get_with_cookie(&h.app, "/api/admin-dashboard", Some(&token)).await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let account = h
        .store
        .find_by_identity("ada@example.com")
        .await?
        .expect("account exists");
    assert!(h.store.set_role(account.id, Role::Admin).await?);

    // Same session, no re-login.
    let reply = get_with_cookie(&h.app, "/auth/status", Some(&token)).await?;
    assert_eq!(
        reply.body,
        json!({ "authenticated": true, "identity": "ada@example.com", "role": "admin" })
    );
    let reply = get_with_cookie(&h.app, "/api/admin-dashboard", Some(&token)).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["message"], "Welcome to the Admin Dashboard");

    assert!(h.store.set_role(account.id, Role::User).await?);
    let reply = get_with_cookie(&h.app, "/api/admin-dashboard", Some(&token)).await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn protected_routes_without_session_are_unauthorized() -> Result<()> {
    let h = harness(None);

    for path in ["/api/my-courses", "/api/admin-dashboard"] {
        let reply = get_with_cookie(&h.app, path, None).await?;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{path}");

        let reply = get_with_cookie(&h.app, path, Some("not-a-real-token")).await?;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn bearer_header_is_accepted() -> Result<()> {
    let h = harness(None);
    let token = register(&h.app, "bea@example.com", "password123")
        .await?
        .session_token()
        .expect("session cookie");

    let request = Request::builder()
        .uri("/api/my-courses")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?;
    let reply = send(&h.app, request).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["user"]["identity"], "bea@example.com");
    Ok(())
}

#[tokio::test]
async fn registration_rejects_duplicates_and_bad_input() -> Result<()> {
    let h = harness(None);

    assert_eq!(
        register(&h.app, "cy@example.com", "password123").await?.status,
        StatusCode::CREATED
    );

    let reply = register(&h.app, "CY@example.com", "different-pass").await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(reply.session_token().is_none());

    let reply = register(&h.app, "not-an-email", "password123").await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = register(&h.app, "dee@example.com", "short").await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    assert_eq!(h.store.account_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn email_field_is_accepted_as_identity() -> Result<()> {
    let h = harness(None);
    let body = json!({ "email": "eve@example.com", "password": "password123" });

    let reply = post_json(&h.app, "/api/register", &body).await?;
    assert_eq!(reply.status, StatusCode::CREATED);

    let reply = post_json(&h.app, "/api/login", &body).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.session_token().is_some());
    Ok(())
}

#[tokio::test]
async fn concurrent_registrations_create_one_account() -> Result<()> {
    let h = harness(None);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let app = h.app.clone();
            tokio::spawn(async move { register(&app, "race@example.com", "password123").await })
        })
        .collect();
    let mut replies = Vec::new();
    for handle in handles {
        replies.push(handle.await??);
    }

    let created = replies
        .iter()
        .filter(|reply| reply.status == StatusCode::CREATED)
        .count();
    let conflicts = replies
        .iter()
        .filter(|reply| reply.status == StatusCode::CONFLICT)
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 3);
    assert_eq!(h.store.account_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn sessions_expire_at_the_absolute_deadline() -> Result<()> {
    let h = harness(None);
    let token = register(&h.app, "eve@example.com", "password123")
        .await?
        .session_token()
        .expect("session cookie");

    h.clock.advance(Duration::seconds(599));
    let reply = get_with_cookie(&h.app, "/api/my-courses", Some(&token)).await?;
    assert_eq!(reply.status, StatusCode::OK);

    // Activity does not extend the deadline.
    h.clock.advance(Duration::seconds(1));
    let reply = get_with_cookie(&h.app, "/api/my-courses", Some(&token)).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = get_with_cookie(&h.app, "/auth/status", Some(&token)).await?;
    assert_eq!(reply.body, json!({ "authenticated": false }));
    Ok(())
}

#[tokio::test]
async fn logout_revokes_and_is_idempotent() -> Result<()> {
    let h = harness(None);
    let token = register(&h.app, "fay@example.com", "password123")
        .await?
        .session_token()
        .expect("session cookie");

    for _ in 0..2 {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/logout")
            .header(
                header::COOKIE,
                format!("{}={token}", api::SESSION_COOKIE_NAME),
            )
            .body(Body::empty())?;
        let reply = send(&h.app, request).await?;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["message"], "Logged out");
        assert_eq!(reply.session_token().as_deref(), Some(""));
    }

    let reply = get_with_cookie(&h.app, "/api/my-courses", Some(&token)).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/logout")
        .body(Body::empty())?;
    assert_eq!(send(&h.app, request).await?.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn status_for_anonymous_caller() -> Result<()> {
    let h = harness(None);
    let reply = get_with_cookie(&h.app, "/auth/status", None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({ "authenticated": false }));
    Ok(())
}

#[tokio::test]
async fn health_reports_store_status() -> Result<()> {
    let h = harness(None);
    let reply = get_with_cookie(&h.app, "/health", None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["database"], "ok");
    assert_eq!(reply.body["name"], env!("CARGO_PKG_NAME"));
    assert!(reply.headers.contains_key("x-app"));
    assert!(reply.headers.contains_key("x-request-id"));
    Ok(())
}

#[tokio::test]
async fn federated_routes_redirect_to_failure_when_unconfigured() -> Result<()> {
    let h = harness(None);

    let reply = get_with_cookie(&h.app, "/auth/google", None).await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some(FAILURE_REDIRECT));

    let reply = get_with_cookie(&h.app, "/auth/google/callback?code=abc&state=xyz", None).await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some(FAILURE_REDIRECT));
    assert!(reply.session_token().is_none());
    Ok(())
}

/// Minimal stand-in for the Google token and userinfo endpoints.
async fn spawn_provider(email: &'static str, email_verified: bool) -> Result<Url> {
    async fn token(Form(form): Form<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        let complete = form.get("grant_type").map(String::as_str) == Some("authorization_code")
            && form.get("code").map(String::as_str) == Some("provider-code")
            && form.get("client_secret").map(String::as_str) == Some("client-secret")
            && form.get("code_verifier").is_some_and(|verifier| verifier.len() >= 43);
        if complete {
            (
                StatusCode::OK,
                Json(json!({ "access_token": "provider-access", "token_type": "Bearer" })),
            )
        } else {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_grant" })),
            )
        }
    }

    let userinfo = move |headers: HeaderMap| async move {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            == Some("Bearer provider-access");
        if authorized {
            (
                StatusCode::OK,
                Json(json!({ "sub": "google-123", "email": email, "email_verified": email_verified })),
            )
        } else {
            (StatusCode::UNAUTHORIZED, Json(json!({})))
        }
    };

    let provider = Router::new()
        .route("/token", post(token))
        .route("/userinfo", get(userinfo));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, provider).await;
    });

    Ok(Url::parse(&format!("http://{addr}/"))?)
}

fn oauth_client(provider: &Url) -> Result<OAuthClient> {
    let config = OAuthConfig::google(
        "client-id",
        SecretString::from("client-secret".to_string()),
        "http://localhost:8080/auth/google/callback",
    )?
    .with_token_url(provider.join("token")?)
    .with_userinfo_url(provider.join("userinfo")?);
    Ok(OAuthClient::new(config))
}

/// Start the flow and return the state plus the transient cookie header.
async fn begin_federated_login(app: &Router) -> Result<(String, String)> {
    let reply = get_with_cookie(app, "/auth/google", None).await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);

    let location = Url::parse(reply.location().expect("redirect location"))?;
    assert!(location.as_str().starts_with("https://accounts.google.com/"));
    let query: HashMap<_, _> = location.query_pairs().into_owned().collect();
    assert_eq!(query.get("code_challenge_method").map(String::as_str), Some("S256"));
    assert_eq!(query.get("scope").map(String::as_str), Some("profile email"));

    let state = query.get("state").cloned().expect("state parameter");
    assert_eq!(
        cookie_value(&reply.headers, "coursegate_oauth_state").as_deref(),
        Some(state.as_str())
    );
    let verifier = cookie_value(&reply.headers, "coursegate_oauth_verifier").expect("verifier");

    let cookies =
        format!("coursegate_oauth_state={state}; coursegate_oauth_verifier={verifier}");
    Ok((state, cookies))
}

async fn callback(app: &Router, state: &str, cookies: &str) -> Result<Reply> {
    let request = Request::builder()
        .uri(format!(
            "/auth/google/callback?code=provider-code&state={state}"
        ))
        .header(header::COOKIE, cookies)
        .body(Body::empty())?;
    send(app, request).await
}

#[tokio::test]
async fn federated_login_reconciles_once_and_issues_session() -> Result<()> {
    let provider = spawn_provider("Grace@Example.com", true).await?;
    let h = harness(Some(oauth_client(&provider)?));

    let (state, cookies) = begin_federated_login(&h.app).await?;
    let reply = callback(&h.app, &state, &cookies).await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some(SUCCESS_REDIRECT));
    assert_eq!(
        cookie_value(&reply.headers, "coursegate_oauth_state").as_deref(),
        Some("")
    );
    let token = reply.session_token().expect("session cookie");

    let status = get_with_cookie(&h.app, "/auth/status", Some(&token)).await?;
    assert_eq!(
        status.body,
        json!({ "authenticated": true, "identity": "grace@example.com", "role": "user" })
    );

    // A second sign-in maps onto the same account.
    let (state, cookies) = begin_federated_login(&h.app).await?;
    let reply = callback(&h.app, &state, &cookies).await?;
    assert_eq!(reply.location(), Some(SUCCESS_REDIRECT));
    assert_eq!(h.store.account_count().await, 1);

    // Federated-only accounts cannot use a password.
    let reply = login(&h.app, "grace@example.com", "!federated-only").await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn federated_login_keeps_existing_local_password() -> Result<()> {
    let provider = spawn_provider("hal@example.com", true).await?;
    let h = harness(Some(oauth_client(&provider)?));

    register(&h.app, "hal@example.com", "password123").await?;

    let (state, cookies) = begin_federated_login(&h.app).await?;
    let reply = callback(&h.app, &state, &cookies).await?;
    assert_eq!(reply.location(), Some(SUCCESS_REDIRECT));
    assert_eq!(h.store.account_count().await, 1);

    let reply = login(&h.app, "hal@example.com", "password123").await?;
    assert_eq!(reply.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn federated_callback_rejects_state_mismatch() -> Result<()> {
    let provider = spawn_provider("ivy@example.com", true).await?;
    let h = harness(Some(oauth_client(&provider)?));

    let (_state, cookies) = begin_federated_login(&h.app).await?;
    let reply = callback(&h.app, "forged-state", &cookies).await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some(FAILURE_REDIRECT));
    assert!(reply.session_token().is_none());
    assert_eq!(h.store.account_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn federated_callback_rejects_unverified_email() -> Result<()> {
    let provider = spawn_provider("jo@example.com", false).await?;
    let h = harness(Some(oauth_client(&provider)?));

    let (state, cookies) = begin_federated_login(&h.app).await?;
    let reply = callback(&h.app, &state, &cookies).await?;
    assert_eq!(reply.location(), Some(FAILURE_REDIRECT));
    assert_eq!(h.store.account_count().await, 0);
    Ok(())
}

/// Accepts connections and never writes a response.
async fn spawn_silent_provider() -> Result<Url> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    Ok(Url::parse(&format!("http://{addr}/"))?)
}

#[tokio::test]
async fn federated_callback_gives_up_on_silent_provider() -> Result<()> {
    let provider = spawn_silent_provider().await?;
    let client = oauth_client(&provider)?;
    let config = client
        .config()
        .clone()
        .with_request_timeout(StdDuration::from_millis(200));
    let h = harness(Some(OAuthClient::new(config)));

    let (state, cookies) = begin_federated_login(&h.app).await?;
    let reply =
        tokio::time::timeout(StdDuration::from_secs(10), callback(&h.app, &state, &cookies))
            .await
            .expect("callback should not hang")?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some(FAILURE_REDIRECT));
    assert!(reply.session_token().is_none());
    assert_eq!(h.store.account_count().await, 0);
    Ok(())
}
