//! Request execution with one-shot token refresh
//!
//! [`Executor::execute`] turns a [`RequestDescriptor`] and a resolved
//! [`Credential`] into exactly one [`ApiResult`]:
//!
//! 1. Pick the auth path from the merged [`AuthMode`] and the credential.
//! 2. POST the JSON body to the target URL, with `auth` in the query string on
//!    the token path.
//! 3. On a 401 carrying `expired_token`, run the refresh grant once and retry
//!    once with the new access token. A second `expired_token` is final.
//! 4. If enabled for the call, re-issue a final token-path 401 through the
//!    fallback webhook, once.
//!
//! Every failure is passed through [`normalize`] before it leaves this module.
//! `Err` is reserved for setup defects such as an auth mode the credential
//! cannot serve.

use std::time::Duration;

use common::Secret;
use portal_auth::{
    AUTH_QUERY_PARAM, Credential, REST_PATH, TOKEN_ENDPOINT, TokenCredential, WebhookCredential,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::normalize::{ApiError, RawFailure, UNKNOWN_ERROR, normalize};
use crate::request::{AuthMode, EffectiveOptions, RequestDescriptor, RequestOptions, query_pairs};
use crate::result::{ApiResult, Execution};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Executor settings shared by every call.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Refresh-token grant endpoint
    pub token_endpoint: String,
    /// Per-request timeout for portal and refresh calls
    pub timeout: Duration,
    /// Log request and response payloads at debug level (`auth` redacted)
    pub debug: bool,
    /// Defaults for options a call leaves unset
    pub defaults: RequestOptions,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            debug: false,
            defaults: RequestOptions::default(),
        }
    }
}

/// Resolved destination of one HTTP request.
struct Target {
    url: String,
    /// Loggable form of `url`; webhook secrets are masked
    display: String,
    auth: Option<Secret<String>>,
    route: &'static str,
}

enum Route<'a> {
    Token(&'a TokenCredential),
    Webhook(&'a WebhookCredential),
}

pub struct Executor {
    client: reqwest::Client,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Use a caller-built client; `config.timeout` is not applied to it.
    pub fn with_client(client: reqwest::Client, config: ExecutorConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Check that `descriptor` can be sent with `credential` without issuing
    /// any request. [`execute`](Self::execute) fails with the same error.
    pub fn validate(&self, descriptor: &RequestDescriptor, credential: &Credential) -> Result<()> {
        let options = descriptor.options.merged(&self.config.defaults);
        if let Route::Webhook(webhook) = select_route(options.auth_mode, credential)? {
            webhook_target(webhook, &descriptor.endpoint, options.access_token.as_ref())?;
        }
        Ok(())
    }

    /// Execute one logical call. See the module docs for the sequence.
    pub async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        credential: &Credential,
    ) -> Result<ApiResult> {
        Ok(self.execute_detailed(descriptor, credential).await?.result)
    }

    /// Like [`execute`](Self::execute), also reporting refreshed tokens and
    /// the number of HTTP attempts.
    #[instrument(skip_all, fields(
        request_id = %format!("req_{}", uuid::Uuid::new_v4().as_simple()),
        endpoint = %descriptor.endpoint,
        kind = %credential.auth_kind()
    ))]
    pub async fn execute_detailed(
        &self,
        descriptor: &RequestDescriptor,
        credential: &Credential,
    ) -> Result<Execution> {
        let options = descriptor.options.merged(&self.config.defaults);

        let execution = match select_route(options.auth_mode, credential)? {
            Route::Webhook(webhook) => {
                let target = webhook_target(webhook, &descriptor.endpoint, options.access_token.as_ref())?;
                let result = self.send(descriptor, &target).await;
                Execution {
                    result,
                    refreshed: None,
                    attempts: 1,
                }
            }
            Route::Token(token) => self.run_token(descriptor, token, &options).await?,
        };

        match &execution.result {
            ApiResult::Success { .. } => debug!(attempts = execution.attempts, "request succeeded"),
            ApiResult::Failure { error } => warn!(
                attempts = execution.attempts,
                code = %error.code,
                status = error.http_status,
                "request failed"
            ),
        }
        Ok(execution)
    }

    async fn run_token(
        &self,
        descriptor: &RequestDescriptor,
        token: &TokenCredential,
        options: &EffectiveOptions,
    ) -> Result<Execution> {
        let access = options
            .access_token
            .clone()
            .unwrap_or_else(|| token.access_token.clone());
        let mut attempts = 1;
        let mut refreshed = None;
        let mut result = self
            .send(descriptor, &token_target(token, &descriptor.endpoint, access))
            .await;

        let expired = matches!(
            &result,
            ApiResult::Failure { error } if error.http_status == 401 && error.is_expired_token()
        );
        if expired && token.can_refresh() {
            match portal_auth::refresh_token(&self.client, &self.config.token_endpoint, token).await {
                Ok(tokens) => {
                    crate::metrics::record_refresh("success");
                    info!(expires_in = tokens.expires_in, "access token refreshed, retrying once");
                    let retry = token_target(
                        token,
                        &descriptor.endpoint,
                        Secret::from(tokens.access_token.as_str()),
                    );
                    result = self.send(descriptor, &retry).await;
                    attempts += 1;
                    refreshed = Some(tokens);
                }
                Err(e) => {
                    crate::metrics::record_refresh("failure");
                    warn!(error = %e, "token refresh failed");
                    if let ApiResult::Failure { error } = &mut result {
                        error.description =
                            format!("token refresh failed: {e}; original error: {}", error.description);
                    }
                }
            }
        } else if expired {
            debug!("access token expired and no refresh token is configured");
        }

        if options.allow_webhook_fallback && result.failure_status() == Some(401) {
            match token.fallback_webhook.as_ref() {
                Some(webhook) => {
                    info!("token path rejected with 401, retrying through webhook");
                    let target = webhook_target(webhook, &descriptor.endpoint, None)?;
                    result = self.send(descriptor, &target).await;
                    attempts += 1;
                }
                None => debug!("webhook fallback enabled but no webhook is configured"),
            }
        }

        Ok(Execution {
            result,
            refreshed,
            attempts,
        })
    }

    /// Send one POST and classify the response. Never fails: transport and
    /// API errors come back as [`ApiResult::Failure`].
    async fn send(&self, descriptor: &RequestDescriptor, target: &Target) -> ApiResult {
        let mut pairs = query_pairs(&descriptor.query);
        if let Some(auth) = &target.auth {
            pairs.retain(|(key, _)| key != AUTH_QUERY_PARAM);
            pairs.push((AUTH_QUERY_PARAM.to_string(), auth.expose().clone()));
        }

        if self.config.debug {
            let logged: Vec<(&str, &str)> = pairs
                .iter()
                .map(|(k, v)| {
                    let v = if k == AUTH_QUERY_PARAM { "<redacted>" } else { v.as_str() };
                    (k.as_str(), v)
                })
                .collect();
            let body = Value::Object(descriptor.body.clone());
            debug!(url = %target.display, query = ?logged, body = %body, "sending request");
        }

        let result = match self
            .client
            .post(&target.url)
            .query(&pairs)
            .json(&descriptor.body)
            .send()
            .await
        {
            Ok(response) => self.classify(response, target).await,
            Err(e) => {
                let status = e.status().map(|s| s.as_u16());
                // The URL carries `auth` in its query
                let message = e.without_url().to_string();
                warn!(url = %target.display, error = %message, "request did not complete");
                ApiResult::Failure {
                    error: normalize(&RawFailure::Transport {
                        status,
                        message: &message,
                        url: &target.display,
                    }),
                }
            }
        };

        let outcome = if result.is_success() { "success" } else { "failure" };
        crate::metrics::record_request(target.route, outcome);
        result
    }

    async fn classify(&self, response: reqwest::Response, target: &Target) -> ApiResult {
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let message = format!("failed to read response body: {e}");
                return ApiResult::Failure {
                    error: normalize(&RawFailure::Transport {
                        status: Some(status),
                        message: &message,
                        url: &target.display,
                    }),
                };
            }
        };

        if self.config.debug {
            debug!(status, body = %body, "received response");
        }

        if !(200..300).contains(&status) {
            return ApiResult::Failure {
                error: normalize(&RawFailure::Response {
                    status,
                    body: &body,
                    url: &target.display,
                }),
            };
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(value) if value.get("error").is_some_and(|e| !e.is_null()) => ApiResult::Failure {
                error: normalize(&RawFailure::Structured {
                    status,
                    value: &value,
                    url: &target.display,
                }),
            },
            Ok(payload @ Value::Object(_)) => ApiResult::Success { payload },
            Ok(_) | Err(_) => ApiResult::Failure {
                error: ApiError {
                    code: UNKNOWN_ERROR.to_string(),
                    description: "response body is not a JSON object".to_string(),
                    http_status: status,
                    raw: Value::String(body),
                },
            },
        }
    }
}

fn select_route(mode: AuthMode, credential: &Credential) -> Result<Route<'_>> {
    match (mode, credential) {
        (AuthMode::Auto | AuthMode::Token, Credential::Token(token)) => Ok(Route::Token(token)),
        (AuthMode::Auto, Credential::Webhook(webhook)) => Ok(Route::Webhook(webhook)),
        (AuthMode::Webhook, _) => credential
            .webhook()
            .map(Route::Webhook)
            .ok_or(Error::AuthModeMismatch {
                mode,
                kind: credential.auth_kind(),
            }),
        (AuthMode::Token, Credential::Webhook(_)) => Err(Error::AuthModeMismatch {
            mode,
            kind: credential.auth_kind(),
        }),
    }
}

fn token_target(token: &TokenCredential, endpoint: &str, access: Secret<String>) -> Target {
    let url = format!("{}/{REST_PATH}/{endpoint}", token.portal_url);
    Target {
        display: url.clone(),
        url,
        auth: Some(access),
        route: "token",
    }
}

/// Webhook call, or `{origin}/rest/{endpoint}?auth=...` when a token override
/// is present.
fn webhook_target(
    webhook: &WebhookCredential,
    endpoint: &str,
    access_override: Option<&Secret<String>>,
) -> Result<Target> {
    let origin = webhook.origin().ok_or(Error::WebhookOrigin)?;
    Ok(match access_override {
        Some(access) => {
            let url = format!("{origin}/{REST_PATH}/{endpoint}");
            Target {
                display: url.clone(),
                url,
                auth: Some(access.clone()),
                route: "token",
            }
        }
        None => Target {
            url: format!("{}/{endpoint}", webhook.url()),
            display: format!("{origin}/{REST_PATH}/<webhook>/{endpoint}"),
            auth: None,
            route: "webhook",
        },
    })
}
