//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::LedgerError;

/// Body returned for every failed report request
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Report failed: {0}")]
    Report(#[from] LedgerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        // Full detail stays in the server log; clients get a uniform body
        match &self {
            ServerError::Report(e) => {
                tracing::error!(error = %e, kind = ?e, "Report generation failed");
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
            }
        }

        let body = Json(json!({
            "status": "error",
            "error": INTERNAL_ERROR_MESSAGE,
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
