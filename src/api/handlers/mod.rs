//! API handlers for coursegate.
//!
//! `auth` owns every credential and session endpoint plus the route guards;
//! `courses` holds the protected endpoints those guards sit in front of.

pub mod auth;
pub mod courses;
pub mod health;
