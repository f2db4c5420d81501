//! Client session lifecycle: credential persistence, auth state, expiry.

pub mod claims;
pub mod manager;
pub mod store;

use thiserror::Error;

/// Session-layer errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend rejected a login or registration; carries its message.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Dialog error: {0}")]
    Dialog(String),
}
