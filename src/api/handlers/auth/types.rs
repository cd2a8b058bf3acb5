//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Principal, Role};

#[derive(ToSchema, Serialize, Deserialize)]
pub struct CredentialsRequest {
    #[serde(alias = "email")]
    pub identity: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsRequest")
            .field("identity", &self.identity)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisteredUser {
    pub id: String,
    pub identity: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub message: String,
    pub user: RegisteredUser,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub principal: Principal,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct StatusResponse {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn anonymous_status_omits_identity_and_role() -> Result<()> {
        let status = StatusResponse {
            authenticated: false,
            identity: None,
            role: None,
        };
        assert_eq!(
            serde_json::to_value(&status)?,
            serde_json::json!({ "authenticated": false })
        );
        Ok(())
    }

    #[test]
    fn credentials_accept_email_field() -> Result<()> {
        let request: CredentialsRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "password123"
        }))?;
        assert_eq!(request.identity, "a@x.com");
        Ok(())
    }

    #[test]
    fn credentials_debug_hides_password() {
        let request = CredentialsRequest {
            identity: "a@x.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(!format!("{request:?}").contains("password123"));
    }
}
