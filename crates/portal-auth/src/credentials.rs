//! Credential resolution
//!
//! The host selects one of three auth kinds with an explicit setting and hands
//! over whatever raw credential material it has stored. [`resolve`] validates
//! the fields the selected kind needs and produces a normalized [`Credential`]:
//! URLs carry an http(s) scheme and never end with a slash.
//!
//! OAuth2 and API-key credentials collapse into the same [`TokenCredential`]
//! shape. They differ in how the token was issued, not in how requests are
//! made; the original kind is kept for reporting.

use std::fmt;
use std::str::FromStr;

use common::Secret;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Configured authentication scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    OAuth2,
    ApiKey,
    Webhook,
}

impl AuthKind {
    /// Label used in config files, logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AuthKind::OAuth2 => "oauth2",
            AuthKind::ApiKey => "apikey",
            AuthKind::Webhook => "webhook",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AuthKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oauth2" => Ok(AuthKind::OAuth2),
            "apikey" => Ok(AuthKind::ApiKey),
            "webhook" => Ok(AuthKind::Webhook),
            other => Err(Error::UnknownAuthKind(other.to_string())),
        }
    }
}

/// Unvalidated credential material as loaded from host storage.
///
/// Every field is optional; which ones are required depends on the
/// [`AuthKind`] passed to [`resolve`]. Blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCredentials {
    pub portal_url: Option<String>,
    pub access_token: Option<Secret<String>>,
    pub refresh_token: Option<Secret<String>>,
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    /// Pre-authenticated webhook URL. Required for the webhook kind; for token
    /// kinds it is kept as the optional 401 fallback.
    pub webhook_url: Option<Secret<String>>,
}

/// Token-based credential (OAuth2 or API key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCredential {
    /// `OAuth2` or `ApiKey`
    pub kind: AuthKind,
    /// Portal base URL without trailing slash
    pub portal_url: String,
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    /// Webhook configured next to the token, used only when webhook fallback
    /// is explicitly enabled for a call.
    pub fallback_webhook: Option<WebhookCredential>,
}

impl TokenCredential {
    /// Whether an `expired_token` response can trigger the refresh grant.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Copy of this credential carrying a refreshed token pair.
    pub fn with_tokens(&self, access_token: Secret<String>, refresh_token: Secret<String>) -> Self {
        Self {
            access_token,
            refresh_token: Some(refresh_token),
            ..self.clone()
        }
    }
}

/// Webhook credential. The URL embeds the user id and secret code
/// (`https://portal/rest/{user}/{code}`), so it is treated as a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookCredential {
    pub webhook_url: Secret<String>,
}

impl WebhookCredential {
    /// Webhook URL without trailing slash.
    pub fn url(&self) -> &str {
        self.webhook_url.expose()
    }

    /// Scheme and host (plus non-default port) of the webhook URL, e.g.
    /// `https://example.bitrix24.com`.
    pub fn origin(&self) -> Option<String> {
        let url = reqwest::Url::parse(self.url()).ok()?;
        url.has_host().then(|| url.origin().ascii_serialization())
    }
}

/// Resolved credential; exactly one variant is active per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Token(TokenCredential),
    Webhook(WebhookCredential),
}

impl Credential {
    /// Which configured kind produced this credential.
    pub fn auth_kind(&self) -> AuthKind {
        match self {
            Credential::Token(token) => token.kind,
            Credential::Webhook(_) => AuthKind::Webhook,
        }
    }

    pub fn as_token(&self) -> Option<&TokenCredential> {
        match self {
            Credential::Token(token) => Some(token),
            Credential::Webhook(_) => None,
        }
    }

    /// The webhook usable for this credential: the webhook variant itself, or
    /// the fallback webhook configured next to a token.
    pub fn webhook(&self) -> Option<&WebhookCredential> {
        match self {
            Credential::Token(token) => token.fallback_webhook.as_ref(),
            Credential::Webhook(webhook) => Some(webhook),
        }
    }
}

/// Resolve raw credential material for the configured kind.
///
/// Fails only when a field required by `kind` is absent or blank, or when a
/// URL is malformed. That is a configuration defect, reported as an error
/// rather than as an API failure. Resolution is pure: equal inputs give
/// equal credentials.
pub fn resolve(kind: AuthKind, raw: &RawCredentials) -> Result<Credential> {
    match kind {
        AuthKind::OAuth2 | AuthKind::ApiKey => {
            let portal_url = present(raw.portal_url.as_deref())
                .ok_or(Error::MissingField {
                    kind,
                    field: "portal_url",
                })
                .and_then(|url| normalize_url("portal_url", url))?;

            let access_token =
                present_secret(raw.access_token.as_ref()).ok_or(Error::MissingField {
                    kind,
                    field: "access_token",
                })?;

            let fallback_webhook = match present_secret(raw.webhook_url.as_ref()) {
                Some(url) => Some(webhook_credential(url.expose())?),
                None => None,
            };

            Ok(Credential::Token(TokenCredential {
                kind,
                portal_url,
                access_token,
                refresh_token: present_secret(raw.refresh_token.as_ref()),
                client_id: present(raw.client_id.as_deref()).map(str::to_owned),
                client_secret: present_secret(raw.client_secret.as_ref()),
                fallback_webhook,
            }))
        }
        AuthKind::Webhook => {
            let url = present_secret(raw.webhook_url.as_ref()).ok_or(Error::MissingField {
                kind,
                field: "webhook_url",
            })?;
            Ok(Credential::Webhook(webhook_credential(url.expose())?))
        }
    }
}

fn webhook_credential(url: &str) -> Result<WebhookCredential> {
    Ok(WebhookCredential {
        webhook_url: Secret::new(normalize_url("webhook_url", url)?),
    })
}

/// Trim whitespace and trailing slashes; require an http(s) URL with a host.
fn normalize_url(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(Error::InvalidUrl {
            field,
            reason: "must start with http:// or https://".into(),
        });
    }
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| Error::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    if !parsed.has_host() {
        return Err(Error::InvalidUrl {
            field,
            reason: "missing host".into(),
        });
    }
    Ok(trimmed.to_string())
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn present_secret(value: Option<&Secret<String>>) -> Option<Secret<String>> {
    value
        .filter(|secret| !secret.is_blank())
        .map(|secret| Secret::new(secret.expose().trim().to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_raw() -> RawCredentials {
        RawCredentials {
            portal_url: Some("https://example.bitrix24.com/".into()),
            access_token: Some("at_1".into()),
            refresh_token: Some("rt_1".into()),
            client_id: Some("local.abc".into()),
            client_secret: Some("cs_1".into()),
            webhook_url: None,
        }
    }

    fn webhook_raw(url: &str) -> RawCredentials {
        RawCredentials {
            webhook_url: Some(url.into()),
            ..Default::default()
        }
    }

    #[test]
    fn auth_kind_parses_labels() {
        assert_eq!("oauth2".parse::<AuthKind>().unwrap(), AuthKind::OAuth2);
        assert_eq!("ApiKey".parse::<AuthKind>().unwrap(), AuthKind::ApiKey);
        assert_eq!(" webhook ".parse::<AuthKind>().unwrap(), AuthKind::Webhook);
        assert!(matches!(
            "basic".parse::<AuthKind>(),
            Err(Error::UnknownAuthKind(k)) if k == "basic"
        ));
    }

    #[test]
    fn auth_kind_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Holder {
            auth: AuthKind,
        }
        let holder: Holder = serde_json::from_str(r#"{"auth":"apikey"}"#).unwrap();
        assert_eq!(holder.auth, AuthKind::ApiKey);
    }

    #[test]
    fn resolves_oauth2_and_trims_trailing_slash() {
        let credential = resolve(AuthKind::OAuth2, &oauth_raw()).unwrap();
        assert_eq!(credential.auth_kind(), AuthKind::OAuth2);

        let token = credential.as_token().unwrap();
        assert_eq!(token.portal_url, "https://example.bitrix24.com");
        assert_eq!(token.access_token.expose(), "at_1");
        assert_eq!(token.refresh_token.as_ref().unwrap().expose(), "rt_1");
        assert_eq!(token.client_id.as_deref(), Some("local.abc"));
        assert!(token.can_refresh());
        assert!(credential.webhook().is_none());
    }

    #[test]
    fn resolves_apikey_without_refresh_material() {
        let raw = RawCredentials {
            portal_url: Some("https://example.bitrix24.com".into()),
            access_token: Some("key_1".into()),
            ..Default::default()
        };
        let credential = resolve(AuthKind::ApiKey, &raw).unwrap();
        assert_eq!(credential.auth_kind(), AuthKind::ApiKey);
        let token = credential.as_token().unwrap();
        assert!(!token.can_refresh());
        assert!(token.client_secret.is_none());
    }

    #[test]
    fn resolves_webhook_and_trims_trailing_slashes() {
        let credential = resolve(
            AuthKind::Webhook,
            &webhook_raw("https://example.bitrix24.com/rest/1/abc123//"),
        )
        .unwrap();
        assert_eq!(credential.auth_kind(), AuthKind::Webhook);
        let webhook = credential.webhook().unwrap();
        assert_eq!(webhook.url(), "https://example.bitrix24.com/rest/1/abc123");
        assert!(credential.as_token().is_none());
    }

    #[test]
    fn webhook_kind_ignores_token_fields_and_requires_url() {
        let err = resolve(AuthKind::Webhook, &oauth_raw()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                kind: AuthKind::Webhook,
                field: "webhook_url"
            }
        ));
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let mut raw = oauth_raw();
        raw.access_token = Some("   ".into());
        let err = resolve(AuthKind::OAuth2, &raw).unwrap_err();
        assert!(err.to_string().contains("access_token"), "got: {err}");

        let mut raw = oauth_raw();
        raw.portal_url = Some("".into());
        let err = resolve(AuthKind::OAuth2, &raw).unwrap_err();
        assert!(err.to_string().contains("portal_url"), "got: {err}");

        let err = resolve(AuthKind::Webhook, &webhook_raw("")).unwrap_err();
        assert!(err.to_string().contains("webhook_url"), "got: {err}");
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let mut raw = oauth_raw();
        raw.refresh_token = Some(" ".into());
        raw.client_id = Some("".into());
        let token = resolve(AuthKind::OAuth2, &raw)
            .unwrap()
            .as_token()
            .cloned()
            .unwrap();
        assert!(token.refresh_token.is_none());
        assert!(token.client_id.is_none());
        assert!(!token.can_refresh());
    }

    #[test]
    fn rejects_url_without_scheme() {
        let mut raw = oauth_raw();
        raw.portal_url = Some("example.bitrix24.com".into());
        let err = resolve(AuthKind::OAuth2, &raw).unwrap_err();
        assert!(
            err.to_string().contains("must start with http"),
            "got: {err}"
        );
    }

    #[test]
    fn token_kind_keeps_webhook_as_fallback() {
        let mut raw = oauth_raw();
        raw.webhook_url = Some("https://example.bitrix24.com/rest/1/abc/".into());
        let credential = resolve(AuthKind::OAuth2, &raw).unwrap();
        let fallback = credential.webhook().unwrap();
        assert_eq!(fallback.url(), "https://example.bitrix24.com/rest/1/abc");
    }

    #[test]
    fn resolve_is_idempotent() {
        let raw = oauth_raw();
        let first = resolve(AuthKind::OAuth2, &raw).unwrap();
        let second = resolve(AuthKind::OAuth2, &raw).unwrap();
        assert_eq!(first, second);

        let raw = webhook_raw("https://example.bitrix24.com/rest/1/abc");
        assert_eq!(
            resolve(AuthKind::Webhook, &raw).unwrap(),
            resolve(AuthKind::Webhook, &raw).unwrap()
        );
    }

    #[test]
    fn webhook_origin_drops_path() {
        let webhook = WebhookCredential {
            webhook_url: "https://example.bitrix24.com/rest/1/abc".into(),
        };
        assert_eq!(
            webhook.origin().as_deref(),
            Some("https://example.bitrix24.com")
        );

        let with_port = WebhookCredential {
            webhook_url: "http://127.0.0.1:8080/rest/1/abc".into(),
        };
        assert_eq!(
            with_port.origin().as_deref(),
            Some("http://127.0.0.1:8080")
        );
    }

    #[test]
    fn with_tokens_replaces_pair_and_keeps_the_rest() {
        let token = resolve(AuthKind::OAuth2, &oauth_raw())
            .unwrap()
            .as_token()
            .cloned()
            .unwrap();
        let refreshed = token.with_tokens("at_2".into(), "rt_2".into());
        assert_eq!(refreshed.access_token.expose(), "at_2");
        assert_eq!(refreshed.refresh_token.unwrap().expose(), "rt_2");
        assert_eq!(refreshed.portal_url, token.portal_url);
        assert_eq!(token.access_token.expose(), "at_1");
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let credential = resolve(AuthKind::OAuth2, &oauth_raw()).unwrap();
        let debug = format!("{credential:?}");
        assert!(!debug.contains("at_1"), "token leaked: {debug}");
        assert!(!debug.contains("cs_1"), "secret leaked: {debug}");
    }
}
