//! Resilient REST request layer for the portal API
//!
//! Sends one logical call per [`Executor::execute`] and always answers with a
//! single [`ApiResult`]. Failures of every shape the platform produces are
//! folded into [`ApiError`] by [`normalize`].
//!
//! Call lifecycle:
//! 1. Caller builds a [`RequestDescriptor`] and resolves a credential with
//!    [`portal_auth::resolve`]
//! 2. Executor merges per-call options over its defaults and picks the auth path
//! 3. An `expired_token` 401 triggers one refresh grant and one retry
//! 4. Optionally, a final token-path 401 is retried once through the webhook
//! 5. [`collect_all_pages`] repeats the call with `start` offsets of [`PAGE_SIZE`]

pub mod error;
pub mod executor;
pub mod metrics;
pub mod normalize;
pub mod paginate;
pub mod request;
pub mod result;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use executor::{Executor, ExecutorConfig};
pub use normalize::{ApiError, RawFailure, normalize};
pub use paginate::{Collected, PAGE_SIZE, collect_all_pages, collect_pages};
pub use request::{AuthMode, EffectiveOptions, RequestDescriptor, RequestOptions};
pub use result::{ApiResult, Execution};
