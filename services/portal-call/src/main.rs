//! Portal REST command-line client
//!
//! Single-binary tool that:
//! 1. Loads portal settings and secrets (TOML file plus env overlay)
//! 2. Resolves the configured credential
//! 3. Executes one REST call, or walks every page with `--all`
//! 4. Prints the JSON outcome on stdout, including refreshed tokens so the
//!    caller can persist them
//!
//! Logs go to stderr as JSON. Exit status: 0 on success, 1 when the portal
//! call failed, 2 on configuration or usage errors.

mod args;
mod config;

use std::process::ExitCode;

use anyhow::{Context, Result};
use common::Secret;
use portal_auth::{Credential, TokenResponse};
use portal_rest::{
    ApiResult, Collected, Execution, Executor, RequestDescriptor, RequestOptions, collect_pages,
};
use serde_json::{Value, json};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::Args;
use crate::config::Config;

const EXIT_API_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

/// Rendered outcome of a command
#[derive(Debug)]
struct Output {
    body: Value,
    success: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support.
    // stdout is reserved for the result document.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    // Usage errors exit with clap's status 2, the same as configuration errors
    let args = Args::parse_args();

    match run(&args).await {
        Ok(output) => {
            println!("{}", output.body);
            if output.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_API_FAILURE)
            }
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "portal-call failed");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

/// Everything up to and including the portal call. `Err` means the call could
/// not be set up; API failures come back as an unsuccessful [`Output`].
async fn run(args: &Args) -> Result<Output> {
    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let credential = portal_auth::resolve(config.portal.auth, &config.raw_credentials())
        .context("failed to resolve portal credentials")?;

    info!(
        auth = %credential.auth_kind(),
        timeout_secs = config.client.timeout_secs,
        webhook_fallback = config.client.allow_webhook_fallback,
        "configuration loaded"
    );

    let descriptor = build_descriptor(args)?;
    let executor = Executor::new(config.executor_config()).context("failed to build executor")?;
    call(&executor, &descriptor, &credential, args.all.as_deref()).await
}

fn build_descriptor(args: &Args) -> Result<RequestDescriptor> {
    let options = RequestOptions {
        auth_mode: args.auth,
        access_token: args.access_token.as_deref().map(Secret::from),
        allow_webhook_fallback: args.webhook_fallback.then_some(true),
    };
    Ok(RequestDescriptor::from_json_args(
        &args.endpoint,
        args.body.as_deref(),
        args.query.as_deref(),
    )?
    .with_options(options))
}

async fn call(
    executor: &Executor,
    descriptor: &RequestDescriptor,
    credential: &Credential,
    all: Option<&str>,
) -> Result<Output> {
    executor
        .validate(descriptor, credential)
        .context("request cannot be sent with the configured credentials")?;

    Ok(match all {
        Some(result_key) => {
            render_collected(collect_pages(executor, descriptor, credential, result_key).await)
        }
        None => render_execution(executor.execute_detailed(descriptor, credential).await?),
    })
}

/// Success prints the portal payload as received; failure prints
/// `{"error": ...}`.
fn render_execution(execution: Execution) -> Output {
    let (mut body, success) = match execution.result {
        ApiResult::Success { payload } => (payload, true),
        ApiResult::Failure { error } => (json!({ "error": error }), false),
    };
    attach_refreshed(&mut body, execution.refreshed.as_ref());
    Output { body, success }
}

/// `{"result": [...], "requests": n}`, plus `error` when a page failed.
fn render_collected(collected: Collected) -> Output {
    let success = collected.error.is_none();
    let mut body = json!({
        "result": collected.items,
        "requests": collected.requests,
    });
    if let Some(error) = collected.error {
        body["error"] = json!(error);
    }
    attach_refreshed(&mut body, collected.refreshed.as_ref());
    Output { body, success }
}

fn attach_refreshed(body: &mut Value, refreshed: Option<&TokenResponse>) {
    if let (Some(tokens), Value::Object(map)) = (refreshed, body) {
        map.insert(
            "refreshed_tokens".into(),
            json!({
                "access_token": tokens.access_token,
                "refresh_token": tokens.refresh_token,
                "expires_in": tokens.expires_in,
            }),
        );
    }
}
