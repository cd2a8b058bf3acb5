//! # Coursegate (course catalog authentication and authorization)
//!
//! `coursegate` decides who a caller is and whether they may reach a given
//! part of the course catalog.
//!
//! ## Accounts
//!
//! An account is keyed by a normalized identity (trimmed, lowercased email).
//! It carries an optional Argon2id password digest and a role, `user` or
//! `admin`. Accounts created through Google sign-in hold a sentinel digest
//! that never verifies, so they cannot log in with a password.
//!
//! ## Sessions
//!
//! Logins issue an opaque random token. Only its SHA-256 hash is stored, next
//! to the account id and an absolute expiry. The role is never stored with
//! the session: every validation re-reads the account, so a role change takes
//! effect on the next request.
//!
//! ## Authorization
//!
//! Each capability requires a tier (`anonymous`, `authenticated`, `admin`).
//! Missing or expired sessions are denied with `401`, insufficient roles with
//! `403`. Storage failures deny rather than allow.

pub mod api;
pub mod auth;
pub mod cli;
pub mod oauth;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
