//! Offset pagination over list endpoints
//!
//! List methods return at most [`PAGE_SIZE`] items per call under
//! `result.<key>` and take the next offset in `query.start`. The collector
//! walks offsets until a page comes back empty or without the key, or a call
//! fails.

use portal_auth::{Credential, TokenResponse};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::executor::Executor;
use crate::normalize::ApiError;
use crate::request::RequestDescriptor;
use crate::result::ApiResult;

/// Server-side page size of list methods
pub const PAGE_SIZE: u64 = 50;

/// Everything a pagination run produced.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    /// Items in server order
    pub items: Vec<Value>,
    /// Page requests issued
    pub requests: usize,
    /// Failure that stopped the run early, if any
    pub error: Option<ApiError>,
    /// Latest token pair obtained by a refresh during the run
    pub refreshed: Option<TokenResponse>,
}

/// Collect every item under `result.<result_key>`.
///
/// Never fails: a failure stops the run and keeps what was gathered. When the
/// first page fails or has no `result_key`, that page's raw payload is
/// returned as the only element so non-list responses are not lost.
pub async fn collect_all_pages(
    executor: &Executor,
    descriptor: &RequestDescriptor,
    credential: &Credential,
    result_key: &str,
) -> Vec<Value> {
    collect_pages(executor, descriptor, credential, result_key)
        .await
        .items
}

/// [`collect_all_pages`] with the request count, the stopping error and any
/// refreshed tokens.
pub async fn collect_pages(
    executor: &Executor,
    descriptor: &RequestDescriptor,
    credential: &Credential,
    result_key: &str,
) -> Collected {
    let mut collected = Collected::default();
    let mut offset = descriptor.start_offset().unwrap_or(0);
    // Refreshed tokens carry over to later pages without touching the caller's copies
    let mut working = credential.clone();
    let mut base = descriptor.clone();

    loop {
        let page = base.with_start(offset);
        let execution = match executor.execute_detailed(&page, &working).await {
            Ok(execution) => execution,
            Err(e) => {
                warn!(endpoint = %descriptor.endpoint, error = %e, "pagination aborted");
                return collected;
            }
        };
        collected.requests += 1;
        crate::metrics::record_page();

        if let Some(tokens) = execution.refreshed {
            if let Credential::Token(token) = &working {
                working = Credential::Token(token.with_tokens(
                    tokens.access_token.as_str().into(),
                    tokens.refresh_token.as_str().into(),
                ));
            }
            if base.options.access_token.is_some() {
                base.options.access_token = Some(tokens.access_token.as_str().into());
            }
            collected.refreshed = Some(tokens);
        }

        let payload = match execution.result {
            ApiResult::Success { payload } => payload,
            ApiResult::Failure { error } => {
                warn!(
                    endpoint = %descriptor.endpoint,
                    start = offset,
                    code = %error.code,
                    "page request failed, returning collected items"
                );
                if collected.requests == 1 {
                    collected.items.push(error.raw.clone());
                }
                collected.error = Some(error);
                return collected;
            }
        };

        let entry = payload
            .get("result")
            .and_then(|result| result.get(result_key))
            .cloned();
        match entry {
            None if collected.requests == 1 => {
                debug!(result_key, "result key absent on first page, returning payload");
                collected.items.push(payload);
                return collected;
            }
            None => {
                debug!(result_key, start = offset, "result key absent, stopping");
                return collected;
            }
            Some(Value::Array(items)) if items.is_empty() => {
                info!(
                    endpoint = %descriptor.endpoint,
                    items = collected.items.len(),
                    pages = collected.requests,
                    "pagination complete"
                );
                return collected;
            }
            Some(Value::Array(items)) => {
                collected.items.extend(items);
                match offset.checked_add(PAGE_SIZE) {
                    Some(next) => offset = next,
                    None => {
                        warn!(start = offset, "offset range exhausted, stopping");
                        return collected;
                    }
                }
            }
            Some(single) => {
                collected.items.push(single);
                return collected;
            }
        }
    }
}
