//! HTTP request handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::info;

use crate::detection::Strategy;
use crate::report::{generate_report, AnomaliesReport};

use super::error::{Result, ServerError};
use super::state::AppState;

/// GET /api/v1/anomalies_report_isolation_forest
pub async fn anomalies_report_isolation_forest(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnomaliesReport>> {
    anomalies_report(state, Strategy::IsolationForest).await
}

/// GET /api/v1/anomalies_report_dbscan
pub async fn anomalies_report_dbscan(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnomaliesReport>> {
    anomalies_report(state, Strategy::Dbscan).await
}

async fn anomalies_report(state: Arc<AppState>, strategy: Strategy) -> Result<Json<AnomaliesReport>> {
    info!(strategy = strategy.as_str(), "Anomalies report requested");

    // Model fitting is CPU-bound; keep it off the async workers
    let config = state.report_config.clone();
    let report = tokio::task::spawn_blocking(move || generate_report(strategy, &config))
        .await
        .map_err(|e| ServerError::Internal(format!("report task failed: {}", e)))??;

    Ok(Json(report))
}

/// GET /api/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime_secs(),
    }))
}
