//! Call outcomes

use portal_auth::TokenResponse;
use serde_json::Value;

use crate::normalize::ApiError;

/// Outcome of one logical call: exactly one variant per call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult {
    /// Parsed response body, unmodified
    Success { payload: Value },
    Failure { error: ApiError },
}

impl ApiResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            ApiResult::Success { payload } => Some(payload),
            ApiResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            ApiResult::Success { .. } => None,
            ApiResult::Failure { error } => Some(error),
        }
    }

    /// HTTP status of a failure; `None` for successes.
    pub fn failure_status(&self) -> Option<u16> {
        self.error().map(|e| e.http_status)
    }

    pub fn into_result(self) -> std::result::Result<Value, ApiError> {
        match self {
            ApiResult::Success { payload } => Ok(payload),
            ApiResult::Failure { error } => Err(error),
        }
    }
}

/// An [`ApiResult`] plus what happened on the way.
#[derive(Debug, Clone)]
pub struct Execution {
    pub result: ApiResult,
    /// Token pair obtained by a refresh during this call. The caller decides
    /// whether to persist it.
    pub refreshed: Option<TokenResponse>,
    /// HTTP requests sent to the portal or webhook (refresh grant excluded)
    pub attempts: u32,
}
