//! API route definitions

use std::sync::Arc;

use axum::{
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::{handlers, state::AppState, ServerConfig};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": "error",
            "error": "Not Found",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "status": "error",
            "error": "Method Not Allowed",
        })),
    )
}

/// CORS for a single configured origin, or any origin for `*`
fn cors_layer(origin: &str) -> CorsLayer {
    if origin != "*" {
        match origin.parse::<HeaderValue>() {
            Ok(value) => {
                return CorsLayer::new()
                    .allow_origin(value)
                    .allow_credentials(true)
                    .allow_methods(AllowMethods::mirror_request())
                    .allow_headers(AllowHeaders::mirror_request());
            }
            Err(_) => warn!(origin = %origin, "Invalid CORS origin, allowing any origin"),
        }
    }
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let report_routes = Router::new()
        .route(
            "/anomalies_report_isolation_forest",
            get(handlers::anomalies_report_isolation_forest),
        )
        .route("/anomalies_report_dbscan", get(handlers::anomalies_report_dbscan));

    Router::new()
        .nest("/api/v1", report_routes)
        .route("/api/health", get(handlers::health_check))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.cors_origin))
        .layer(TraceLayer::new_for_http())
}
