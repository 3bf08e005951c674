//! Command-line arguments

use clap::Parser;
use portal_rest::AuthMode;

#[derive(Parser, Debug)]
#[command(name = "portal-call")]
#[command(version)]
#[command(about = "Call a portal REST method and print the JSON outcome")]
pub struct Args {
    /// Config file (falls back to CONFIG_PATH, then portal-call.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Dotted REST method, e.g. crm.deal.list
    pub endpoint: String,

    /// JSON object sent as the request body
    #[arg(long)]
    pub body: Option<String>,

    /// JSON object sent as the query string
    #[arg(long)]
    pub query: Option<String>,

    /// Collect every page, reading items under result.<RESULT_KEY>
    #[arg(long, value_name = "RESULT_KEY")]
    pub all: Option<String>,

    /// Access token used instead of the configured one
    #[arg(long)]
    pub access_token: Option<String>,

    /// Auth path: auto, token or webhook
    #[arg(long)]
    pub auth: Option<AuthMode>,

    /// Retry a final 401 through the configured webhook
    #[arg(long)]
    pub webhook_fallback: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
