//! Wire DTOs for the auth endpoints.
//!
//! Every auth response is a tagged envelope: `success: bool` plus an
//! optional human-readable `message`. The envelope is validated here, in
//! one place, so the rest of the workspace only ever sees
//! `Result<domain type, ApiError>` and never re-checks `success` flags.

use serde::{Deserialize, Serialize};

use skylark_core::models::auth::{ActivityConfig, SessionBundle, User};

use crate::error::ApiError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterRequest<'a> {
    pub email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Login and registration share this response shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub activity_config: Option<ActivityConfig>,
}

impl AuthResponse {
    /// Validate the envelope and extract the session bundle.
    pub fn into_bundle(self) -> Result<SessionBundle, ApiError> {
        if !self.success {
            return Err(rejected(self.message, "authentication failed"));
        }
        let token = self
            .token
            .ok_or_else(|| ApiError::Decode("success response missing token".into()))?;
        let user = self
            .user
            .ok_or_else(|| ApiError::Decode("success response missing user".into()))?;
        Ok(SessionBundle {
            token,
            refresh_token: self.refresh_token,
            user,
            activity_config: self.activity_config,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl RefreshResponse {
    pub fn into_token(self) -> Result<String, ApiError> {
        if !self.success {
            return Err(rejected(self.message, "token refresh rejected"));
        }
        self.token
            .ok_or_else(|| ApiError::Decode("success response missing token".into()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl UserResponse {
    /// A successful envelope without a user means "no such user".
    pub fn into_user(self) -> Result<Option<User>, ApiError> {
        if !self.success {
            return Err(rejected(self.message, "user lookup rejected"));
        }
        Ok(self.user)
    }
}

/// An HTTP-200 envelope carrying `success: false`.
fn rejected(message: Option<String>, fallback: &str) -> ApiError {
    ApiError::Api {
        status: 200,
        message: message.unwrap_or_else(|| fallback.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_envelope_yields_bundle() {
        let json = r#"{
            "success": true,
            "token": "tok",
            "refreshToken": "refresh",
            "user": {"id": "u1", "email": "a@b.c"},
            "activityConfig": {"inactivityWarningSeconds": 5, "warningCountdownSeconds": 10}
        }"#;
        let response: AuthResponse = serde_json::from_str(json).expect("parse");
        let bundle = response.into_bundle().expect("bundle");
        assert_eq!(bundle.token, "tok");
        assert_eq!(bundle.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(bundle.user.email, "a@b.c");
        assert_eq!(
            bundle.activity_config.expect("config").inactivity_warning_seconds,
            5
        );
    }

    #[test]
    fn failed_envelope_carries_server_message() {
        let json = r#"{"success": false, "message": "Invalid credentials"}"#;
        let response: AuthResponse = serde_json::from_str(json).expect("parse");
        let err = response.into_bundle().expect_err("rejected");
        assert!(matches!(
            err,
            ApiError::Api { message, .. } if message == "Invalid credentials"
        ));
    }

    #[test]
    fn success_without_token_is_a_decode_error() {
        let json = r#"{"success": true, "user": {"id": "u1", "email": "a@b.c"}}"#;
        let response: AuthResponse = serde_json::from_str(json).expect("parse");
        assert!(matches!(
            response.into_bundle(),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn user_lookup_miss_is_not_an_error() {
        let json = r#"{"success": true}"#;
        let response: UserResponse = serde_json::from_str(json).expect("parse");
        assert!(response.into_user().expect("ok").is_none());
    }
}
