//! Error types for credential resolution and token refresh

use crate::credentials::AuthKind;

/// Errors from credential resolution and the refresh grant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} credentials are missing required field `{field}`")]
    MissingField { kind: AuthKind, field: &'static str },

    #[error("invalid {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("unknown auth kind `{0}` (expected oauth2, apikey or webhook)")]
    UnknownAuthKind(String),

    #[error("cannot refresh token: `{0}` is not configured")]
    RefreshUnavailable(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint error: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
