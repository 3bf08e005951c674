//! Caller and configuration errors
//!
//! API-level failures never surface here; they are returned as
//! [`ApiResult::Failure`](crate::ApiResult::Failure). This type is reserved for
//! defects in how the call was set up.

use portal_auth::AuthKind;
use thiserror::Error;

use crate::request::AuthMode;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Credential(#[from] portal_auth::Error),

    #[error("invalid request arguments: {0}")]
    InvalidArguments(String),

    #[error("auth mode `{mode}` cannot be used with {kind} credentials")]
    AuthModeMismatch { mode: AuthMode, kind: AuthKind },

    #[error("cannot derive portal origin from the webhook URL")]
    WebhookOrigin,

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, Error>;
