//! Portal authentication library
//!
//! Turns configured credential material into a normalized [`Credential`] and
//! performs the OAuth refresh-token grant. The request layer in `portal-rest`
//! consumes both; this crate has no knowledge of REST endpoints or paging.
//!
//! Credential flow:
//! 1. Host loads raw settings and calls [`resolve`] with the configured [`AuthKind`]
//! 2. Request layer sends calls with the resolved [`Credential`]
//! 3. On an `expired_token` response the request layer calls [`refresh_token`]
//! 4. The new token pair is handed back to the host, which persists it

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{
    AuthKind, Credential, RawCredentials, TokenCredential, WebhookCredential, resolve,
};
pub use error::{Error, Result};
pub use token::{TokenResponse, refresh_token};
