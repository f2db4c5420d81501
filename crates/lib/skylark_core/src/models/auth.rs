//! Session domain models.
//!
//! These are internal domain models; the wire DTOs (camelCase envelopes
//! with `success`/`message` tags) live in `skylark_api_client` and are
//! converted into these types at the API boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated principal as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl User {
    /// Whether the user carries the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Server-issued idle-timeout thresholds. Present only while authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityConfig {
    /// Seconds of inactivity before the warning dialog opens.
    pub inactivity_warning_seconds: u64,
    /// Seconds the warning countdown runs before forced logout.
    pub warning_countdown_seconds: u64,
}

impl Default for ActivityConfig {
    /// Fallback thresholds for rehydrated sessions stored before the
    /// server started issuing a config.
    fn default() -> Self {
        Self {
            inactivity_warning_seconds: 30,
            warning_countdown_seconds: 60,
        }
    }
}

/// JWT claims read from the access token payload.
///
/// The client never verifies signatures — only `exp` is load-bearing, the
/// rest is tolerated as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — user ID (standard JWT `sub` claim).
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    #[serde(default)]
    pub iat: i64,
}

/// Login form payload.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

/// Registration form payload.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub name: Option<String>,
    pub password: String,
}

/// Validated success payload of a login or registration call.
#[derive(Debug, Clone)]
pub struct SessionBundle {
    pub token: String,
    pub refresh_token: Option<String>,
    pub user: User,
    pub activity_config: Option<ActivityConfig>,
}

/// Lifecycle phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPhase {
    #[default]
    Anonymous,
    Authenticated,
    /// A token refresh is in flight; the session is still usable.
    Refreshing,
}

/// Snapshot of the authentication state published by the session manager.
///
/// `is_authenticated` is true iff both `user` and `token` are set; the
/// derived flags are computed in [`AuthState::authenticated`] so no
/// construction path can leave them inconsistent.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub phase: AuthPhase,
    pub user: Option<User>,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_authenticated: bool,
    pub is_admin: bool,
    pub token_expiry: Option<DateTime<Utc>>,
}

impl AuthState {
    /// Build an authenticated state with consistent derived flags.
    pub fn authenticated(
        user: User,
        token: String,
        refresh_token: Option<String>,
        token_expiry: Option<DateTime<Utc>>,
    ) -> Self {
        let is_admin = user.is_admin;
        Self {
            phase: AuthPhase::Authenticated,
            user: Some(user),
            token: Some(token),
            refresh_token,
            is_authenticated: true,
            is_admin,
            token_expiry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_admin: bool) -> User {
        User {
            id: "u1".into(),
            email: "a@b.c".into(),
            name: None,
            roles: vec!["guest".into()],
            is_admin,
        }
    }

    #[test]
    fn default_state_is_anonymous() {
        let state = AuthState::default();
        assert_eq!(state.phase, AuthPhase::Anonymous);
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        assert!(state.token.is_none());
    }

    #[test]
    fn authenticated_state_derives_flags_from_user() {
        let state = AuthState::authenticated(user(true), "tok".into(), None, None);
        assert_eq!(state.phase, AuthPhase::Authenticated);
        assert!(state.is_authenticated);
        assert!(state.is_admin);
    }

    #[test]
    fn user_deserializes_from_camel_case() {
        let json = r#"{"id":"u1","email":"a@b.c","roles":["admin"],"isAdmin":true}"#;
        let user: User = serde_json::from_str(json).expect("parse user");
        assert!(user.is_admin);
        assert!(user.has_role("admin"));
        assert!(user.name.is_none());
    }

    #[test]
    fn activity_config_deserializes_from_camel_case() {
        let json = r#"{"inactivityWarningSeconds":5,"warningCountdownSeconds":10}"#;
        let config: ActivityConfig = serde_json::from_str(json).expect("parse config");
        assert_eq!(config.inactivity_warning_seconds, 5);
        assert_eq!(config.warning_countdown_seconds, 10);
    }
}
