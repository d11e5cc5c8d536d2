//! ledgerwatch - Transaction anomaly reports
//!
//! Loads a CSV of transactions, flags unusual amounts with one of two
//! off-the-shelf detectors and returns the flagged rows as a report.
//!
//! # Modules
//!
//! ## Pipeline
//! - [`dataset`] - Transaction records and CSV loading
//! - [`preprocessing`] - Standard scaling of the amount feature
//! - [`detection`] - The two interchangeable detection strategies
//! - [`report`] - Report construction and the end-to-end pipeline
//!
//! ## Models
//! - [`anomaly`] - Isolation Forest
//! - [`clustering`] - DBSCAN
//! - [`training`] - K-fold splits and the DBSCAN grid search
//!
//! ## Services
//! - [`server`] - HTTP API
//! - [`cli`] - Command-line interface
//! - [`config`] - Configuration

pub mod error;
pub mod config;

pub mod dataset;
pub mod preprocessing;
pub mod detection;
pub mod report;

pub mod anomaly;
pub mod clustering;
pub mod training;

pub mod server;
pub mod cli;

pub use error::{LedgerError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{LedgerError, Result};

    pub use crate::config::{AppConfig, DbscanSearchConfig, IsolationForestConfig, ReportConfig};
    pub use crate::dataset::{DatasetLoader, Transaction};
    pub use crate::detection::{ScoredTransaction, Strategy};
    pub use crate::report::{generate_report, AnomaliesReport};

    pub use crate::anomaly::{AnomalyDetector, AnomalyResult, IsolationForest};
    pub use crate::clustering::DBSCAN;
    pub use crate::preprocessing::StandardScaler;
    pub use crate::training::{DbscanGridSearch, KFold};

    pub use crate::server::{create_router, AppState, ServerConfig};
}
