use super::handlers::{
    auth::{self, require_admin, require_authenticated},
    courses, health,
};
use axum::middleware;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Protected endpoints are grouped per tier, each group behind its own
/// `route_layer` guard, then merged.
pub(crate) fn api_router() -> OpenApiRouter {
    let authenticated = OpenApiRouter::new()
        .routes(routes!(courses::my_courses))
        .route_layer(middleware::from_fn(require_authenticated));

    let admin = OpenApiRouter::new()
        .routes(routes!(courses::admin_dashboard))
        .route_layer(middleware::from_fn(require_admin));

    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::session::logout))
        .routes(routes!(auth::session::status))
        .routes(routes!(auth::federated::google))
        .routes(routes!(auth::federated::google_callback))
        .merge(authenticated)
        .merge(admin);

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Registration, login, logout and federated sign-in".to_string());

    let mut courses_tag = Tag::new("courses");
    courses_tag.description = Some("Endpoints that require a session".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and storage status".to_string());

    router.get_openapi_mut().tags = Some(vec![auth_tag, courses_tag, health_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}
