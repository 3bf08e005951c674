//! OAuth refresh-token grant
//!
//! The portal's token endpoint is a fixed, shared URL (see
//! [`TOKEN_ENDPOINT`](crate::constants::TOKEN_ENDPOINT)), not part of the
//! tenant's portal. The grant is a GET carrying the parameters in the query
//! string. The endpoint reports failures either with a non-2xx status or with
//! an `{error, error_description}` body on a 2xx status.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credentials::TokenCredential;
use crate::error::{Error, Result};

/// Token pair returned by the refresh grant.
///
/// `expires_in` is a delta in seconds from the response time. The pair is
/// handed back to the host; nothing in this workspace persists it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: u64,
}

/// Exchange the credential's refresh token for a new token pair.
///
/// Fails without any I/O when `client_id`, `client_secret` or `refresh_token`
/// is missing: refresh cannot be attempted without them, and the caller must
/// not loop on that condition.
pub async fn refresh_token(
    client: &reqwest::Client,
    token_endpoint: &str,
    credential: &TokenCredential,
) -> Result<TokenResponse> {
    let client_id = credential
        .client_id
        .as_deref()
        .ok_or(Error::RefreshUnavailable("client_id"))?;
    let client_secret = credential
        .client_secret
        .as_ref()
        .ok_or(Error::RefreshUnavailable("client_secret"))?;
    let refresh = credential
        .refresh_token
        .as_ref()
        .ok_or(Error::RefreshUnavailable("refresh_token"))?;

    debug!(portal = %credential.portal_url, "requesting refresh-token grant");

    let response = client
        .get(token_endpoint)
        .query(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret.expose().as_str()),
            ("refresh_token", refresh.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {}", e.without_url())))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));

    if !status.is_success() {
        warn!(status = status.as_u16(), "token endpoint rejected refresh");
        // 401/403 means the refresh token or client credentials are revoked
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let value: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;

    if let Some(error) = value.get("error") {
        let code = error.as_str().map(str::to_owned).unwrap_or_else(|| error.to_string());
        let description = value
            .get("error_description")
            .and_then(|d| d.as_str())
            .unwrap_or_default();
        warn!(code = %code, "token endpoint returned an error body");
        return Err(Error::TokenExchange(format!("{code}: {description}")));
    }

    serde_json::from_value::<TokenResponse>(value)
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}
