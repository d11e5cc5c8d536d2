//! Pipeline and application configuration
//!
//! Every knob the report pipeline reads lives here, so the dataset path and
//! model hyperparameters are passed in explicitly rather than baked into the
//! detectors. A TOML file can override any of the defaults:
//!
//! ```toml
//! [server]
//! port = 8000
//!
//! [report]
//! dataset_path = "data/transactions_dataset.csv"
//!
//! [report.isolation_forest]
//! contamination = 0.02
//! seed = 42
//!
//! [report.dbscan]
//! eps_candidates = [0.3, 0.5, 1.0]
//! min_samples_candidates = [10, 15, 20]
//! cv_folds = 5
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LedgerError, Result};
use crate::server::ServerConfig;

/// Default location of the transaction dataset
pub const DEFAULT_DATASET_PATH: &str = "data/transactions_dataset.csv";

/// Default location of the optional config file
pub const DEFAULT_CONFIG_PATH: &str = "./ledgerwatch.toml";

/// Isolation Forest settings for the score-threshold report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationForestConfig {
    /// Expected fraction of anomalous rows
    pub contamination: f64,

    /// Fixed decision-score cutoff. When set, rows scoring strictly below it
    /// are flagged and the contamination ranking is not used for labelling.
    pub score_threshold: Option<f64>,

    /// Number of isolation trees
    pub n_estimators: usize,

    /// Rows drawn (without replacement) per tree
    pub max_samples: usize,

    /// Seed for tree construction
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            contamination: 0.02,
            score_threshold: None,
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// DBSCAN grid-search settings for the density-clustering report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbscanSearchConfig {
    /// Candidate neighbourhood radii (in standardized units)
    pub eps_candidates: Vec<f64>,

    /// Candidate minimum neighbourhood sizes (the point itself included)
    pub min_samples_candidates: Vec<usize>,

    /// Number of cross-validation folds
    pub cv_folds: usize,
}

impl Default for DbscanSearchConfig {
    fn default() -> Self {
        Self {
            eps_candidates: vec![0.3, 0.5, 1.0],
            min_samples_candidates: vec![10, 15, 20],
            cv_folds: 5,
        }
    }
}

/// Configuration for both report pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// CSV file holding the transactions
    pub dataset_path: PathBuf,

    pub isolation_forest: IsolationForestConfig,

    pub dbscan: DbscanSearchConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            isolation_forest: IsolationForestConfig::default(),
            dbscan: DbscanSearchConfig::default(),
        }
    }
}

impl ReportConfig {
    /// Defaults pointing at another dataset
    pub fn with_dataset(path: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: path.into(),
            ..Self::default()
        }
    }

    /// Reject settings the detectors cannot run with
    pub fn validate(&self) -> Result<()> {
        let forest = &self.isolation_forest;
        if !(forest.contamination > 0.0 && forest.contamination <= 0.5) {
            return Err(LedgerError::invalid_config(
                "isolation_forest.contamination",
                forest.contamination,
                "must be in (0, 0.5]",
            ));
        }
        if let Some(threshold) = forest.score_threshold {
            if !threshold.is_finite() {
                return Err(LedgerError::invalid_config(
                    "isolation_forest.score_threshold",
                    threshold,
                    "must be finite",
                ));
            }
        }
        if forest.n_estimators == 0 {
            return Err(LedgerError::invalid_config(
                "isolation_forest.n_estimators",
                forest.n_estimators,
                "must be at least 1",
            ));
        }
        if forest.max_samples == 0 {
            return Err(LedgerError::invalid_config(
                "isolation_forest.max_samples",
                forest.max_samples,
                "must be at least 1",
            ));
        }

        let dbscan = &self.dbscan;
        if dbscan.eps_candidates.is_empty() {
            return Err(LedgerError::invalid_config(
                "dbscan.eps_candidates",
                "[]",
                "at least one candidate is required",
            ));
        }
        if let Some(eps) = dbscan.eps_candidates.iter().find(|e| !(**e > 0.0) || !e.is_finite()) {
            return Err(LedgerError::invalid_config(
                "dbscan.eps_candidates",
                eps,
                "radii must be positive and finite",
            ));
        }
        if dbscan.min_samples_candidates.is_empty() {
            return Err(LedgerError::invalid_config(
                "dbscan.min_samples_candidates",
                "[]",
                "at least one candidate is required",
            ));
        }
        if dbscan.min_samples_candidates.contains(&0) {
            return Err(LedgerError::invalid_config(
                "dbscan.min_samples_candidates",
                0,
                "sizes must be at least 1",
            ));
        }
        if dbscan.cv_folds < 2 {
            return Err(LedgerError::invalid_config(
                "dbscan.cv_folds",
                dbscan.cv_folds,
                "must be at least 2",
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub report: ReportConfig,
}

impl AppConfig {
    /// Load configuration from `path`, `LEDGERWATCH_CONFIG` or the default
    /// location. A missing file is only an error when it was asked for
    /// explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file_path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match env::var("LEDGERWATCH_CONFIG") {
                Ok(p) => (PathBuf::from(p), true),
                Err(_) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
            },
        };

        let mut config = if file_path.exists() {
            let content = std::fs::read_to_string(&file_path)?;
            let config: AppConfig = toml::from_str(&content)?;
            info!(path = %file_path.display(), "Loaded configuration file");
            config
        } else if explicit {
            return Err(LedgerError::invalid_config(
                "config",
                file_path.display(),
                "file not found",
            ));
        } else {
            warn!(path = %file_path.display(), "Config file not found, using defaults");
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.report.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = env::var("DATASET_PATH") {
            if !path.trim().is_empty() {
                self.report.dataset_path = PathBuf::from(path.trim());
            }
        }
    }
}
