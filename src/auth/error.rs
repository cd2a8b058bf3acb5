//! Error taxonomy for authentication and authorization flows.
//!
//! Expected outcomes (`Validation`, `AuthFailure`, `InvalidSession`,
//! `InsufficientRole`, `DuplicateIdentity`) are surfaced to callers verbatim.
//! `StoreUnavailable` and `Hashing` keep their cause for logging only; their
//! `Display` never includes backend detail.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("identity already exists")]
    DuplicateIdentity,

    #[error("invalid credentials")]
    AuthFailure,

    #[error("session is not valid")]
    InvalidSession,

    #[error("insufficient role")]
    InsufficientRole,

    #[error("storage unavailable")]
    StoreUnavailable(#[source] anyhow::Error),

    #[error("password hashing failed")]
    Hashing(#[source] anyhow::Error),
}

impl AuthError {
    /// Unexpected failures that must be logged and hidden from the caller.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Hashing(_))
    }
}
