//! Anomaly detection models
//!
//! Label convention shared by every detector: `-1` marks an outlier, `1` an
//! inlier. Decision scores are signed so that lower means more anomalous.

mod isolation_forest;

pub use isolation_forest::{IsolationForest, IsolationTree};

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Label assigned to outliers
pub const OUTLIER: i32 = -1;

/// Label assigned to inliers
pub const INLIER: i32 = 1;

/// Anomaly detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Decision scores (lower = more anomalous)
    pub scores: Array1<f64>,
    /// Binary labels (-1 = anomaly, 1 = normal)
    pub labels: Array1<i32>,
    /// Decision boundary applied to the scores
    pub threshold: f64,
    /// Number of anomalies detected
    pub n_anomalies: usize,
}

impl AnomalyResult {
    /// Row indices labelled as outliers, in row order
    pub fn anomaly_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == OUTLIER)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Trait for anomaly detectors
pub trait AnomalyDetector: Send + Sync {
    /// Fit the detector on training data
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Signed decision score per sample (lower = more anomalous)
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Predict labels (-1 = anomaly, 1 = normal)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let threshold = self.threshold();
        Ok(self
            .decision_function(x)?
            .mapv(|s| if s < threshold { OUTLIER } else { INLIER }))
    }

    /// Fit and predict in one step
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<i32>> {
        self.fit(x)?;
        self.predict(x)
    }

    /// Get detection results with scores and labels
    fn detect(&self, x: &Array2<f64>) -> Result<AnomalyResult> {
        let scores = self.decision_function(x)?;
        let threshold = self.threshold();
        let labels = scores.mapv(|s| if s < threshold { OUTLIER } else { INLIER });
        let n_anomalies = labels.iter().filter(|&&l| l == OUTLIER).count();

        Ok(AnomalyResult {
            scores,
            labels,
            threshold,
            n_anomalies,
        })
    }

    /// Decision boundary: scores strictly below it are anomalous
    fn threshold(&self) -> f64 {
        0.0
    }
}
