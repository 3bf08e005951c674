//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Tokens and client secrets are loaded from env vars or `*_file` paths and
//! are never read from the TOML directly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{Secret, read_secret_file};
use portal_auth::{AuthKind, RawCredentials, TOKEN_ENDPOINT};
use portal_rest::{ExecutorConfig, RequestOptions};
use serde::Deserialize;

const ENV_ACCESS_TOKEN: &str = "PORTAL_ACCESS_TOKEN";
const ENV_REFRESH_TOKEN: &str = "PORTAL_REFRESH_TOKEN";
const ENV_CLIENT_SECRET: &str = "PORTAL_CLIENT_SECRET";
const ENV_WEBHOOK_URL: &str = "PORTAL_WEBHOOK_URL";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub portal: PortalConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Portal identity and credential sources
#[derive(Debug, Deserialize)]
pub struct PortalConfig {
    pub auth: AuthKind,
    #[serde(default)]
    pub portal_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Webhook URL; `PORTAL_WEBHOOK_URL` and `webhook_url_file` take precedence
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_url_file: Option<PathBuf>,
    #[serde(default)]
    pub access_token_file: Option<PathBuf>,
    #[serde(default)]
    pub refresh_token_file: Option<PathBuf>,
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,

    #[serde(skip)]
    pub access_token: Option<Secret<String>>,
    #[serde(skip)]
    pub refresh_token: Option<Secret<String>>,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    #[serde(skip)]
    pub webhook: Option<Secret<String>>,
}

/// HTTP client behavior
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub allow_webhook_fallback: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            token_endpoint: default_token_endpoint(),
            debug: false,
            allow_webhook_fallback: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_token_endpoint() -> String {
    TOKEN_ENDPOINT.to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Each secret resolves from its env var first, then its `*_file` path.
    /// Required fields per auth kind are checked later by credential
    /// resolution, not here.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Some(url) = &config.portal.portal_url {
            require_http("portal_url", url)?;
        }
        require_http("token_endpoint", &config.client.token_endpoint)?;

        if config.client.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        let portal = &mut config.portal;
        portal.access_token = secret_from(ENV_ACCESS_TOKEN, portal.access_token_file.as_deref())?;
        portal.refresh_token =
            secret_from(ENV_REFRESH_TOKEN, portal.refresh_token_file.as_deref())?;
        portal.client_secret =
            secret_from(ENV_CLIENT_SECRET, portal.client_secret_file.as_deref())?;
        portal.webhook = match secret_from(ENV_WEBHOOK_URL, portal.webhook_url_file.as_deref())? {
            Some(webhook) => Some(webhook),
            None => portal
                .webhook_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(Secret::from),
        };

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("portal-call.toml")
    }

    /// Credential material for [`portal_auth::resolve`].
    pub fn raw_credentials(&self) -> RawCredentials {
        RawCredentials {
            portal_url: self.portal.portal_url.clone(),
            access_token: self.portal.access_token.clone(),
            refresh_token: self.portal.refresh_token.clone(),
            client_id: self.portal.client_id.clone(),
            client_secret: self.portal.client_secret.clone(),
            webhook_url: self.portal.webhook.clone(),
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            token_endpoint: self.client.token_endpoint.clone(),
            timeout: Duration::from_secs(self.client.timeout_secs),
            debug: self.client.debug,
            defaults: RequestOptions {
                allow_webhook_fallback: Some(self.client.allow_webhook_fallback),
                ..Default::default()
            },
        }
    }
}

fn require_http(field: &str, url: &str) -> common::Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(());
    }
    Err(common::Error::Config(format!(
        "{field} must start with http:// or https://, got: {url}"
    )))
}

/// Env var wins over the file; blank values on either side count as unset.
fn secret_from(env_key: &str, file: Option<&Path>) -> common::Result<Option<Secret<String>>> {
    if let Ok(value) = std::env::var(env_key)
        && !value.trim().is_empty()
    {
        return Ok(Some(Secret::new(value.trim().to_owned())));
    }
    match file {
        Some(path) => read_secret_file(path),
        None => Ok(None),
    }
}
