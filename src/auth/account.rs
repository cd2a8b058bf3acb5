//! Accounts, roles and the request principal.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::AuthError;

pub type AccountId = Uuid;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin { Self::Admin } else { Self::User }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Persisted account row.
///
/// `password_hash` is `None` or the federated-only sentinel for accounts
/// created through a federated login.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub identity: String,
    pub password_hash: Option<String>,
    pub role: Role,
}

impl Account {
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            account_id: self.id,
            identity: self.identity.clone(),
            role: self.role,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "***"))
            .field("role", &self.role)
            .finish()
    }
}

/// Identity and role resolved for a single request. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Principal {
    #[schema(value_type = String)]
    pub account_id: AccountId,
    pub identity: String,
    pub role: Role,
}

/// Normalize an identity for lookup/uniqueness checks.
#[must_use]
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_identity(identity_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(identity_normalized))
}

/// Validate registration input and return the normalized identity.
///
/// # Errors
/// Returns [`AuthError::Validation`] for a malformed identity or a short password.
pub fn validate_registration(identity: &str, password: &str) -> Result<String, AuthError> {
    let identity = normalize_identity(identity);
    if identity.is_empty() {
        return Err(AuthError::Validation("Missing identity".to_string()));
    }
    if !valid_identity(&identity) {
        return Err(AuthError::Validation("Invalid email".to_string()));
    }
    if password.trim().chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_identity_trims_and_lowercases() {
        assert_eq!(normalize_identity(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_identity_accepts_basic_format() {
        assert!(valid_identity("a@x.com"));
        assert!(valid_identity("name.surname@example.co"));
        assert!(!valid_identity("not-an-email"));
        assert!(!valid_identity("missing-domain@"));
    }

    #[test]
    fn validate_registration_rejects_bad_input() {
        assert!(matches!(
            validate_registration("  ", "password123"),
            Err(AuthError::Validation(msg)) if msg == "Missing identity"
        ));
        assert!(matches!(
            validate_registration("nope", "password123"),
            Err(AuthError::Validation(msg)) if msg == "Invalid email"
        ));
        assert!(matches!(
            validate_registration("u1@test.com", "   short   "),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn validate_registration_normalizes_identity() {
        let identity = validate_registration(" U1@Test.com", "password123").ok();
        assert_eq!(identity.as_deref(), Some("u1@test.com"));
    }

    #[test]
    fn role_round_trips_through_admin_flag_and_str() {
        assert_eq!(Role::from_admin_flag(true), Role::Admin);
        assert_eq!(Role::from_admin_flag(false), Role::User);
        assert!(Role::Admin.is_admin());
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn account_debug_hides_password_hash() {
        let account = Account {
            id: Uuid::nil(),
            identity: "a@x.com".to_string(),
            password_hash: Some("$argon2id$secret".to_string()),
            role: Role::User,
        };
        let rendered = format!("{account:?}");
        assert!(!rendered.contains("secret"));
        assert_eq!(account.principal().identity, "a@x.com");
    }
}
