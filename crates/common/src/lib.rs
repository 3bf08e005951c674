//! Shared types for the portal REST workspace
//!
//! Holds the pieces every crate needs: the redacting `Secret` wrapper used for
//! access tokens, refresh tokens and client secrets, and the configuration
//! error type returned while loading settings.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, read_secret_file};
