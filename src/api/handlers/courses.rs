//! Course endpoints behind the route guards.
//!
//! Handlers receive the resolved principal explicitly; they never look the
//! session up themselves.

use axum::{Json, extract::Extension};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Principal;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CoursesResponse {
    pub message: String,
    pub user: Principal,
}

#[utoipa::path(
    get,
    path = "/api/my-courses",
    responses(
        (status = 200, description = "Courses for the logged-in user", body = CoursesResponse),
        (status = 401, description = "No valid session", body = super::auth::types::ErrorResponse)
    ),
    tag = "courses"
)]
pub async fn my_courses(Extension(principal): Extension<Principal>) -> Json<CoursesResponse> {
    Json(CoursesResponse {
        message: "Welcome to My Courses!".to_string(),
        user: principal,
    })
}

#[utoipa::path(
    get,
    path = "/api/admin-dashboard",
    responses(
        (status = 200, description = "Admin dashboard", body = CoursesResponse),
        (status = 401, description = "No valid session", body = super::auth::types::ErrorResponse),
        (status = 403, description = "Logged in without the admin role", body = super::auth::types::ErrorResponse)
    ),
    tag = "courses"
)]
pub async fn admin_dashboard(Extension(principal): Extension<Principal>) -> Json<CoursesResponse> {
    Json(CoursesResponse {
        message: "Welcome to the Admin Dashboard".to_string(),
        user: principal,
    })
}
