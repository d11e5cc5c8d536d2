//! HTTP server for the anomaly reports
//!
//! Two read-only endpoints, one per detection strategy, plus a health check.
//! Requests share no mutable state: each one reloads the dataset and refits
//! its own model.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::{ServerError, INTERNAL_ERROR_MESSAGE};
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::ReportConfig;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS; `*` allows any origin without credentials
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost".to_string()),
        }
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig, report_config: ReportConfig) -> anyhow::Result<()> {
    report_config.validate()?;

    if !report_config.dataset_path.exists() {
        // Not fatal: the report endpoints answer 500 until the file appears
        error!(
            path = %report_config.dataset_path.display(),
            "Dataset not found, report endpoints will fail"
        );
    }

    let state = Arc::new(AppState::new(report_config.clone()));
    let start_time = state.started_at;
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        address = %addr,
        dataset = %report_config.dataset_path.display(),
        contamination = report_config.isolation_forest.contamination,
        cv_folds = report_config.dbscan.cv_folds,
        cors_origin = %config.cors_origin,
        started_at = %start_time.to_rfc3339(),
        "Anomaly report server starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
