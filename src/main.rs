//! ledgerwatch - Main Entry Point
//!
//! Serves transaction anomaly reports over HTTP, or prints one from the CLI.

use clap::Parser;
use ledgerwatch::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ledgerwatch=info,tower_http=info".into());

    // LOG_FORMAT=json for machine-readable logs
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    cli::run(Cli::parse()).await
}
