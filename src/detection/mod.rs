//! Detection strategies over the transaction amount feature
//!
//! Both strategies share one contract: given the loaded transactions and the
//! report configuration, return the anomalous subset in input order.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::anomaly::{IsolationForest, OUTLIER};
use crate::clustering::{DBSCAN, NOISE};
use crate::config::ReportConfig;
use crate::dataset::Transaction;
use crate::error::{LedgerError, Result};
use crate::preprocessing::StandardScaler;
use crate::training::{DbscanGridSearch, KFold};

/// A transaction with the values the detector derived for it
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTransaction {
    pub transaction: Transaction,
    /// Isolation Forest decision score (lower = more anomalous)
    pub score: Option<f64>,
    /// Standardized amount fed to the clustering model
    pub scaled_amount: Option<f64>,
    /// Outlier label (-1) or cluster / inlier label
    pub label: i64,
}

impl ScoredTransaction {
    pub fn is_anomalous(&self) -> bool {
        self.label == NOISE
    }
}

/// Available detection strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Score-threshold detection with an Isolation Forest
    IsolationForest,
    /// Density clustering with a cross-validated DBSCAN
    Dbscan,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::IsolationForest, Strategy::Dbscan];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::IsolationForest => "isolation_forest",
            Strategy::Dbscan => "dbscan",
        }
    }

    /// Fit the strategy's model and return every row with its derived values
    pub fn score(&self, records: &[Transaction], config: &ReportConfig) -> Result<Vec<ScoredTransaction>> {
        if records.is_empty() {
            return Err(LedgerError::ModelFitting(
                "no transactions to fit".to_string(),
            ));
        }
        match self {
            Strategy::IsolationForest => score_isolation_forest(records, config),
            Strategy::Dbscan => score_dbscan(records, config),
        }
    }

    /// Anomalous rows, in input order
    pub fn detect(&self, records: &[Transaction], config: &ReportConfig) -> Result<Vec<Transaction>> {
        let flagged: Vec<Transaction> = self
            .score(records, config)?
            .into_iter()
            .filter(ScoredTransaction::is_anomalous)
            .map(|scored| scored.transaction)
            .collect();

        info!(
            strategy = self.as_str(),
            rows = records.len(),
            anomalies = flagged.len(),
            "Detection finished"
        );
        Ok(flagged)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "isolation_forest" | "iforest" => Ok(Strategy::IsolationForest),
            "dbscan" => Ok(Strategy::Dbscan),
            other => Err(LedgerError::invalid_config(
                "strategy",
                other,
                "expected 'isolation_forest' or 'dbscan'",
            )),
        }
    }
}

/// Single-column feature matrix of transaction amounts
fn amount_feature(records: &[Transaction]) -> Result<Array2<f64>> {
    let amounts: Vec<f64> = records.iter().map(|t| t.amount).collect();
    Ok(Array2::from_shape_vec((amounts.len(), 1), amounts)?)
}

fn score_isolation_forest(records: &[Transaction], config: &ReportConfig) -> Result<Vec<ScoredTransaction>> {
    let settings = &config.isolation_forest;
    let x = amount_feature(records)?;

    let mut model = IsolationForest::new()
        .with_n_estimators(settings.n_estimators)
        .with_max_samples(settings.max_samples)
        .with_contamination(settings.contamination)
        .with_score_threshold(settings.score_threshold)
        .with_seed(settings.seed);
    info!(
        contamination = settings.contamination,
        score_threshold = ?settings.score_threshold,
        n_estimators = settings.n_estimators,
        seed = settings.seed,
        "Initialized Isolation Forest model"
    );

    let result = model.fit_detect(&x)?;

    Ok(records
        .iter()
        .zip(result.scores.iter().zip(result.labels.iter()))
        .map(|(transaction, (&score, &label))| ScoredTransaction {
            transaction: transaction.clone(),
            score: Some(score),
            scaled_amount: None,
            label: if label == OUTLIER { NOISE } else { i64::from(label) },
        })
        .collect())
}

fn score_dbscan(records: &[Transaction], config: &ReportConfig) -> Result<Vec<ScoredTransaction>> {
    let settings = &config.dbscan;
    let x = amount_feature(records)?;
    let scaled = StandardScaler::new().fit_transform(&x)?;

    let search = DbscanGridSearch::new(
        settings.eps_candidates.clone(),
        settings.min_samples_candidates.clone(),
        KFold::new(settings.cv_folds),
    );
    let best = search.fit(&scaled)?.best_params;

    let mut model = DBSCAN::new(best.eps, best.min_samples);
    let labels = model.fit_predict(&scaled)?;
    info!(
        eps = best.eps,
        min_samples = best.min_samples,
        clusters = model.n_clusters_found,
        noise = model.n_noise,
        "Fitted DBSCAN with best params"
    );

    Ok(records
        .iter()
        .zip(scaled.column(0).iter().zip(labels.iter()))
        .map(|(transaction, (&z, &label))| ScoredTransaction {
            transaction: transaction.clone(),
            score: None,
            scaled_amount: Some(z),
            label,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transactions(amounts: &[f64]) -> Vec<Transaction> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, &a)| Transaction::new(format!("TXN{:03}", i), "2023-01-01", a, "US"))
            .collect()
    }

    fn amounts_with_outliers() -> Vec<f64> {
        let mut amounts: Vec<f64> = (0..96).map(|i| 100.0 + (i % 24) as f64 * 0.5).collect();
        amounts.insert(10, 9_000.0);
        amounts.insert(40, 12_500.0);
        amounts.insert(70, 15_000.0);
        amounts.push(18_000.0);
        amounts
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("dbscan".parse::<Strategy>().unwrap(), Strategy::Dbscan);
        assert_eq!("Isolation-Forest".parse::<Strategy>().unwrap(), Strategy::IsolationForest);
        assert_eq!("iforest".parse::<Strategy>().unwrap(), Strategy::IsolationForest);
        assert!("kmeans".parse::<Strategy>().is_err());
        assert_eq!(Strategy::Dbscan.to_string(), "dbscan");
    }

    #[test]
    fn test_isolation_forest_flags_round_contamination_rows() {
        let records = transactions(&amounts_with_outliers());
        let mut config = ReportConfig::default();
        config.isolation_forest.contamination = 0.04;

        let flagged = Strategy::IsolationForest.detect(&records, &config).unwrap();
        let ids: Vec<&str> = flagged.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["TXN010", "TXN040", "TXN070", "TXN099"]);
    }

    #[test]
    fn test_dbscan_flags_noise_in_input_order() {
        let records = transactions(&amounts_with_outliers());
        let config = ReportConfig::default();

        let scored = Strategy::Dbscan.score(&records, &config).unwrap();
        assert!(scored.iter().all(|s| s.scaled_amount.is_some() && s.score.is_none()));

        let flagged = Strategy::Dbscan.detect(&records, &config).unwrap();
        let amounts: Vec<f64> = flagged.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![9_000.0, 12_500.0, 15_000.0, 18_000.0]);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let records = transactions(&amounts_with_outliers());
        let config = ReportConfig::default();
        for strategy in Strategy::ALL {
            let first = strategy.detect(&records, &config).unwrap();
            let second = strategy.detect(&records, &config).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_empty_dataset_fails_to_fit() {
        let config = ReportConfig::default();
        for strategy in Strategy::ALL {
            assert!(matches!(
                strategy.detect(&[], &config),
                Err(LedgerError::ModelFitting(_))
            ));
        }
    }
}
