//! Auth handlers and supporting modules.
//!
//! Local registration and login, federated (Google) sign-in, logout, the
//! session status check, and the route guards that protect course endpoints.
//!
//! ## Session transport
//!
//! The session token travels in the `coursegate_session` cookie
//! (`HttpOnly; SameSite=Lax`, `Secure` when the frontend is served over
//! HTTPS) or as an `Authorization: Bearer` header. Only its SHA-256 hash is
//! stored.

mod error;
pub(crate) mod federated;
pub(crate) mod login;
pub(crate) mod principal;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod types;

pub use principal::{require_admin, require_authenticated};
pub use session::SESSION_COOKIE_NAME;
pub use state::{AuthConfig, AuthState};
