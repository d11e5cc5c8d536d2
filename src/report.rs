//! Anomaly report construction

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ReportConfig;
use crate::dataset::{DatasetLoader, Transaction};
use crate::detection::Strategy;
use crate::error::Result;

/// Anomalous transactions found by one detection run
///
/// Serializes as `{"anomalies": [{"Transaction_ID": ..., "Date": ...,
/// "Transaction_Amount": ..., "Country": ...}, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomaliesReport {
    pub anomalies: Vec<Transaction>,
}

impl AnomaliesReport {
    /// Wrap the detector's output, keeping its order
    pub fn build(anomalies: Vec<Transaction>) -> Self {
        Self { anomalies }
    }

    pub fn len(&self) -> usize {
        self.anomalies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// Run the full pipeline: load the dataset, detect, build the report
///
/// Every call re-reads the dataset and refits the model.
pub fn generate_report(strategy: Strategy, config: &ReportConfig) -> Result<AnomaliesReport> {
    config.validate()?;

    let records = DatasetLoader::new(&config.dataset_path).load()?;
    let report = AnomaliesReport::build(strategy.detect(&records, config)?);

    info!(
        strategy = strategy.as_str(),
        anomalies = report.len(),
        "Anomalies report built"
    );
    Ok(report)
}
