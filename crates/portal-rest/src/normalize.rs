//! Error normalization for portal responses
//!
//! The platform reports failures in several shapes: an `{error,
//! error_description}` envelope (frequently on HTTP 200), a non-2xx body
//! literally formatted as `"<status> - <json-or-text>"`, plain text, or no
//! response at all. [`normalize`] folds every shape into one [`ApiError`].
//!
//! The function is pure and total: no I/O, no panics, and any input yields a
//! well-formed error. The original structure is always kept under `raw`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// 401 without a recognized refreshable condition
pub const AUTH_FAILED: &str = "AUTH_FAILED";
/// 404 from the portal; the description names the attempted URL
pub const ENDPOINT_NOT_FOUND: &str = "ENDPOINT_NOT_FOUND";
/// Platform code that triggers the one-shot refresh path
pub const EXPIRED_TOKEN: &str = "expired_token";
/// Unparseable or unclassified failure
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// `"<status> - <remainder>"`; the remainder may span lines.
static STATUS_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(\d+)\s*-\s*(.*)$").expect("status prefix pattern is valid"));

/// Canonical failure returned to callers.
///
/// `code` is one of the constants in this module or a platform code passed
/// through verbatim (e.g. `QUERY_LIMIT_EXCEEDED`). `http_status` is 0 when no
/// status is known (transport failures).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: String,
    pub description: String,
    pub http_status: u16,
    pub raw: Value,
}

impl ApiError {
    pub fn is_expired_token(&self) -> bool {
        self.code == EXPIRED_TOKEN
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.http_status == 0 {
            write!(f, "{}: {}", self.code, self.description)
        } else {
            write!(f, "{} ({}): {}", self.code, self.http_status, self.description)
        }
    }
}

/// A failure as observed by the executor, before classification.
#[derive(Debug, Clone, Copy)]
pub enum RawFailure<'a> {
    /// A value that already carries `error` / `error_description` fields, such
    /// as a 2xx envelope the executor parsed.
    Structured {
        status: u16,
        value: &'a Value,
        url: &'a str,
    },
    /// An HTTP response flagged as failed, with its body as received.
    Response {
        status: u16,
        body: &'a str,
        url: &'a str,
    },
    /// The request produced no usable response.
    Transport {
        status: Option<u16>,
        message: &'a str,
        url: &'a str,
    },
}

/// Convert any failure shape into an [`ApiError`]. First match wins:
///
/// 1. a structured value exposing `error`
/// 2. text shaped `"<status> - <rest>"`
/// 3. a JSON object body exposing `error`
/// 4. transport signals: 401, 404, anything else
pub fn normalize(failure: &RawFailure<'_>) -> ApiError {
    let (status, text, url) = match *failure {
        RawFailure::Structured { status, value, url } => {
            if let Some(error) = from_error_envelope(value, status) {
                return error;
            }
            // No error fields: classify on the serialized value instead
            return fallback(status, &value.to_string(), url, value.clone());
        }
        RawFailure::Response { status, body, url } => (status, body, url),
        RawFailure::Transport {
            status,
            message,
            url,
        } => (status.unwrap_or(0), message, url),
    };

    if let Some(error) = from_status_prefix(text) {
        return error;
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text.trim())
        && let Some(error) = from_error_envelope(&value, status)
    {
        return error;
    }

    fallback(status, text, url, Value::String(text.to_string()))
}

/// Step 2: `"400 - {...}"` or `"503 - Service Unavailable"`.
fn from_status_prefix(text: &str) -> Option<ApiError> {
    let captures = STATUS_PREFIX.captures(text.trim())?;
    // A prefix too large for a status code is not a status prefix
    let status: u16 = captures.get(1)?.as_str().parse().ok()?;
    let remainder = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(remainder) {
        if let Some(error) = from_error_envelope(&value, status) {
            return Some(error);
        }
        return Some(ApiError {
            code: UNKNOWN_ERROR.to_string(),
            description: remainder.to_string(),
            http_status: status,
            raw: value,
        });
    }

    Some(ApiError {
        code: UNKNOWN_ERROR.to_string(),
        description: remainder.to_string(),
        http_status: status,
        raw: Value::String(text.to_string()),
    })
}

/// Steps 1 and 3: read `error` / `error_description` from a JSON object.
///
/// `error` is usually a string code. Some endpoints nest an object with
/// `code` / `message`; anything else is stringified.
fn from_error_envelope(value: &Value, status: u16) -> Option<ApiError> {
    let object: &Map<String, Value> = value.as_object()?;
    let error = object.get("error").filter(|e| !e.is_null())?;

    let (code, nested_message) = match error {
        Value::String(code) => (code.clone(), None),
        Value::Object(inner) => (
            inner
                .get("code")
                .map(value_text)
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            inner.get("message").map(value_text),
        ),
        other => (value_text(other), None),
    };

    let description = object
        .get("error_description")
        .filter(|d| !d.is_null())
        .map(value_text)
        .or(nested_message)
        .unwrap_or_else(|| code.clone());

    Some(ApiError {
        code,
        description,
        http_status: status,
        raw: value.clone(),
    })
}

/// Step 4: classify on the status alone.
fn fallback(status: u16, message: &str, url: &str, raw: Value) -> ApiError {
    let message = message.trim();
    let (code, description) = match status {
        401 => (
            AUTH_FAILED,
            if message.is_empty() {
                "authentication failed".to_string()
            } else {
                message.to_string()
            },
        ),
        404 => (ENDPOINT_NOT_FOUND, format!("endpoint not found: {url}")),
        _ => (
            UNKNOWN_ERROR,
            if message.is_empty() {
                format!("request failed with HTTP {status}")
            } else {
                message.to_string()
            },
        ),
    };
    ApiError {
        code: code.to_string(),
        description,
        http_status: status,
        raw,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
