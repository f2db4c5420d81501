//! API error taxonomy, mapped from HTTP status at the response boundary.

use thiserror::Error;

use skylark_core::session::SessionError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 — missing, expired, or invalid credential.
    #[error("unauthorized")]
    Unauthorized,

    /// 403 — the current principal categorically lacks access.
    #[error("forbidden")]
    Forbidden,

    /// Any other non-success status, or a `success: false` envelope.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("response decode error: {0}")]
    Decode(String),
}

impl From<ApiError> for SessionError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Unauthorized | ApiError::Forbidden => {
                SessionError::Token(e.to_string())
            }
            ApiError::Api { message, .. } => SessionError::Authentication(message),
            ApiError::Transport(e) => SessionError::Network(e.to_string()),
            ApiError::Decode(message) => SessionError::Network(message),
        }
    }
}
