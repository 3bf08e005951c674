//! Request descriptors and per-call options
//!
//! A [`RequestDescriptor`] names a dotted endpoint (`crm.deal.list`), the JSON
//! body, the query map and a [`RequestOptions`] value. Options are merged once
//! at the call boundary with a fixed precedence: a value set on the call wins
//! over the executor's configured default, which wins over the built-in
//! default (`Auto` mode, no token override, no webhook fallback).

use std::fmt;
use std::str::FromStr;

use common::Secret;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Which auth path a call takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Follow the resolved credential's variant
    #[default]
    Auto,
    /// Portal URL plus `auth` token
    Token,
    /// Webhook URL (the credential's own or the fallback webhook)
    Webhook,
}

impl AuthMode {
    pub fn label(&self) -> &'static str {
        match self {
            AuthMode::Auto => "auto",
            AuthMode::Token => "token",
            AuthMode::Webhook => "webhook",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(AuthMode::Auto),
            "token" => Ok(AuthMode::Token),
            "webhook" => Ok(AuthMode::Webhook),
            other => Err(Error::InvalidArguments(format!(
                "unknown auth mode `{other}` (expected auto, token or webhook)"
            ))),
        }
    }
}

/// Per-call overrides. `None` means "not set here".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub auth_mode: Option<AuthMode>,
    /// Token to send instead of the credential's access token. On the webhook
    /// path it switches the call to `{origin}/rest/{endpoint}?auth=...`.
    pub access_token: Option<Secret<String>>,
    /// Re-issue a token call through the webhook after a final 401.
    pub allow_webhook_fallback: Option<bool>,
}

impl RequestOptions {
    /// Merge with `defaults`; fields set on `self` take precedence.
    pub fn merged(&self, defaults: &RequestOptions) -> EffectiveOptions {
        EffectiveOptions {
            auth_mode: self.auth_mode.or(defaults.auth_mode).unwrap_or_default(),
            access_token: self
                .access_token
                .clone()
                .or_else(|| defaults.access_token.clone())
                .filter(|token| !token.is_blank()),
            allow_webhook_fallback: self
                .allow_webhook_fallback
                .or(defaults.allow_webhook_fallback)
                .unwrap_or(false),
        }
    }
}

/// Options after merging; every field has a concrete value.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveOptions {
    pub auth_mode: AuthMode,
    pub access_token: Option<Secret<String>>,
    pub allow_webhook_fallback: bool,
}

/// One REST call, before auth is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// Dotted method name without leading slash
    pub endpoint: String,
    pub body: Map<String, Value>,
    pub query: Map<String, Value>,
    pub options: RequestOptions,
}

impl RequestDescriptor {
    pub fn new(endpoint: impl AsRef<str>) -> Self {
        Self {
            endpoint: normalize_endpoint(endpoint.as_ref()),
            body: Map::new(),
            query: Map::new(),
            options: RequestOptions::default(),
        }
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a descriptor from caller-supplied JSON strings.
    ///
    /// Malformed JSON, or JSON that is not an object, is a caller defect and
    /// is reported as [`Error::InvalidArguments`]. Blank strings mean "empty".
    pub fn from_json_args(
        endpoint: impl AsRef<str>,
        body: Option<&str>,
        query: Option<&str>,
    ) -> Result<Self> {
        let descriptor = Self::new(endpoint);
        if descriptor.endpoint.is_empty() {
            return Err(Error::InvalidArguments("endpoint must not be empty".into()));
        }
        Ok(descriptor
            .with_body(parse_object("body", body)?)
            .with_query(parse_object("query", query)?))
    }

    /// Caller-supplied `start` from the query map, if it is a non-negative
    /// integer or a numeric string.
    pub fn start_offset(&self) -> Option<u64> {
        match self.query.get("start")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Copy of this descriptor with `query.start` set to `offset`.
    pub fn with_start(&self, offset: u64) -> Self {
        let mut page = self.clone();
        page.query.insert("start".into(), Value::from(offset));
        page
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_start_matches('/').to_string()
}

fn parse_object(field: &str, raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::InvalidArguments(format!(
            "{field} must be a JSON object, got {}",
            json_type(&other)
        ))),
        Err(e) => Err(Error::InvalidArguments(format!(
            "{field} is not valid JSON: {e}"
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Flatten a query map into `key=value` pairs using the bracket convention
/// the platform expects: `filter[>ID]=5`, `select[0]=ID`. Nulls are dropped.
pub(crate) fn query_pairs(query: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in query {
        flatten_into(key.clone(), value, &mut pairs);
    }
    pairs
}

fn flatten_into(prefix: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => pairs.push((prefix, if *b { "1" } else { "0" }.to_string())),
        Value::Number(n) => pairs.push((prefix, n.to_string())),
        Value::String(s) => pairs.push((prefix, s.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(format!("{prefix}[{index}]"), item, pairs);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                flatten_into(format!("{prefix}[{key}]"), item, pairs);
            }
        }
    }
}
