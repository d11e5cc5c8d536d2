//! Command-line interface
//!
//! `serve` runs the HTTP API; `report` runs one pipeline and prints the JSON
//! report, which is handy for checking a dataset without starting a server.

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::AppConfig;
use crate::detection::Strategy;
use crate::report::generate_report;
use crate::server::run_server;

#[derive(Parser)]
#[command(name = "ledgerwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Anomaly reports over a transaction dataset")]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); falls back to LEDGERWATCH_CONFIG or ./ledgerwatch.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one detection pipeline and print its report
    Report {
        /// Detection strategy (isolation_forest, dbscan)
        strategy: Strategy,

        /// Dataset to analyse instead of the configured one
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Parse arguments already handed to [`Cli`] and run the chosen command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        None => cmd_serve(config, None, None).await,
        Some(Commands::Serve { host, port }) => cmd_serve(config, host, port).await,
        Some(Commands::Report { strategy, dataset, output }) => {
            cmd_report(config, strategy, dataset, output)
        }
    }
}

pub async fn cmd_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    run_server(config.server, config.report).await
}

pub fn cmd_report(
    mut config: AppConfig,
    strategy: Strategy,
    dataset: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(dataset) = dataset {
        config.report.dataset_path = dataset;
    }

    let start = Instant::now();
    let report = generate_report(strategy, &config.report)
        .with_context(|| format!("{} report failed", strategy))?;
    let json = serde_json::to_string_pretty(&report)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }

    info!(
        strategy = strategy.as_str(),
        anomalies = report.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Report command finished"
    );
    Ok(())
}
