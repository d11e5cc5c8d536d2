//! Error types for the anomaly report pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Dataset unavailable: {0}")]
    DatasetUnavailable(String),

    #[error("Malformed dataset: {0}")]
    MalformedDataset(String),

    #[error("Model fitting failed: {0}")]
    ModelFitting(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid configuration: {name} = {value}, {reason}")]
    InvalidConfig {
        name: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub(crate) fn invalid_config(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        LedgerError::InvalidConfig {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for LedgerError {
    fn from(err: polars::error::PolarsError) -> Self {
        LedgerError::MalformedDataset(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::invalid_config("config file", "<toml>", err.to_string())
    }
}

impl From<ndarray::ShapeError> for LedgerError {
    fn from(err: ndarray::ShapeError) -> Self {
        LedgerError::Internal(format!("invalid shape: {}", err))
    }
}
