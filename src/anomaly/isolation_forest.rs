//! Isolation Forest anomaly detection

use crate::anomaly::{AnomalyDetector, AnomalyResult, INLIER, OUTLIER};
use crate::error::{LedgerError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IsolationTree {
    /// Internal node with split
    Internal {
        /// Feature index for split
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left subtree (values < threshold)
        left: Box<IsolationTree>,
        /// Right subtree (values >= threshold)
        right: Box<IsolationTree>,
    },
    /// External (leaf) node
    External {
        /// Number of samples in this node
        size: usize,
    },
}

impl IsolationTree {
    /// Build an isolation tree
    pub fn build(
        x: &Array2<f64>,
        indices: &[usize],
        height: usize,
        max_height: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let n_samples = indices.len();

        if height >= max_height || n_samples <= 1 {
            return IsolationTree::External { size: n_samples };
        }

        let feature = rng.gen_range(0..x.ncols());

        let (min_val, max_val) = indices
            .iter()
            .map(|&i| x[[i, feature]])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        // All values equal: nothing left to isolate
        if max_val - min_val <= f64::EPSILON * max_val.abs().max(1.0) {
            return IsolationTree::External { size: n_samples };
        }

        let threshold = rng.gen_range(min_val..max_val);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] < threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let left = Box::new(Self::build(x, &left_indices, height + 1, max_height, rng));
        let right = Box::new(Self::build(x, &right_indices, height + 1, max_height, rng));

        IsolationTree::Internal {
            feature,
            threshold,
            left,
            right,
        }
    }

    /// Path length for a sample, with the `c(size)` correction at the leaf
    pub fn path_length(&self, sample: &[f64]) -> f64 {
        let mut node = self;
        let mut depth = 0usize;
        loop {
            match node {
                IsolationTree::External { size } => {
                    return depth as f64 + average_path_length(*size);
                }
                IsolationTree::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] < *threshold { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points:
/// `c(n) = 2 H(n-1) - 2(n-1)/n`, with `H(i) ≈ ln(i) + γ`
pub(crate) fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n_f = n as f64;
            2.0 * ((n_f - 1.0).ln() + EULER_GAMMA) - 2.0 * (n_f - 1.0) / n_f
        }
    }
}

/// Isolation Forest anomaly detector
///
/// Decision scores follow `raw - offset`, where `raw = -2^(-E[h(x)] / c(ψ))`.
/// Without a fixed score threshold, the offset is placed between the
/// `round(contamination · n)`-th lowest training score and the next strictly
/// higher one, so every row [`IsolationForest::fit_detect`] flags has a
/// negative decision score. `fit_detect` flags exactly that many rows.
/// `predict` and `detect` only look at the sign of the decision score, so
/// training rows tied with the last flagged one are flagged there too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Number of trees
    n_estimators: usize,
    /// Maximum samples per tree
    max_samples: usize,
    /// Contamination ratio (expected proportion of outliers)
    contamination: f64,
    /// Fixed decision-score cutoff, replaces the contamination ranking
    score_threshold: Option<f64>,
    /// Random seed
    seed: Option<u64>,
    /// Fitted trees
    trees: Option<Vec<IsolationTree>>,
    /// Samples drawn per tree during fit (ψ)
    sample_size: Option<usize>,
    /// Shift applied to raw scores
    offset: Option<f64>,
}

impl IsolationForest {
    /// Create new Isolation Forest
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            score_threshold: None,
            seed: None,
            trees: None,
            sample_size: None,
            offset: None,
        }
    }

    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    /// Set maximum samples per tree
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = n.max(1);
        self
    }

    /// Set contamination ratio
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = c.clamp(0.0, 0.5);
        self
    }

    /// Flag rows whose decision score is strictly below `threshold`
    pub fn with_score_threshold(mut self, threshold: Option<f64>) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Raw isolation scores, in `[-1, 0)`: lower means isolated sooner
    pub fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let trees = self.trees.as_ref().ok_or(LedgerError::ModelNotFitted)?;
        let c_n = average_path_length(self.sample_size.unwrap_or(self.max_samples));
        // ψ = 1 gives c = 0; every point is equally (un)isolated
        let c_n = if c_n > 0.0 { c_n } else { 1.0 };

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample: Vec<f64> = x.row(i).to_vec();
                let avg_path_length = trees
                    .iter()
                    .map(|tree| tree.path_length(&sample))
                    .sum::<f64>()
                    / trees.len() as f64;

                -(2.0_f64.powf(-avg_path_length / c_n))
            })
            .collect();

        Ok(Array1::from_vec(scores))
    }

    /// Number of rows the contamination ranking flags out of `n`
    fn n_flagged(&self, n: usize) -> usize {
        ((self.contamination * n as f64).round() as usize).min(n)
    }

    /// Fit on `x` and label the same rows
    ///
    /// With no score threshold configured, exactly `round(contamination · n)`
    /// rows are labelled outliers: the lowest raw scores, ties broken by row
    /// order.
    pub fn fit_detect(&mut self, x: &Array2<f64>) -> Result<AnomalyResult> {
        self.fit(x)?;
        let raw = self.score_samples(x)?;
        let offset = self.offset.ok_or(LedgerError::ModelNotFitted)?;
        let scores = raw.mapv(|s| s - offset);

        let labels = match self.score_threshold {
            Some(threshold) => scores.mapv(|s| if s < threshold { OUTLIER } else { INLIER }),
            None => {
                let k = self.n_flagged(x.nrows());
                let mut labels = Array1::from_elem(x.nrows(), INLIER);
                for &i in ranked_ascending(&raw).iter().take(k) {
                    labels[i] = OUTLIER;
                }
                labels
            }
        };
        let n_anomalies = labels.iter().filter(|&&l| l == OUTLIER).count();

        Ok(AnomalyResult {
            scores,
            labels,
            threshold: self.threshold(),
            n_anomalies,
        })
    }
}

/// Indices sorted by score, lowest first; equal scores keep row order
fn ranked_ascending(scores: &Array1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));
    order
}

/// Offset that puts the `k` lowest raw scores strictly below zero
///
/// Sits halfway between the k-th lowest score and the next strictly higher
/// one, skipping ties. With nothing higher, it sits just above the k-th.
fn offset_above_kth(raw: &Array1<f64>, order: &[usize], k: usize) -> f64 {
    if k == 0 {
        return raw[order[0]];
    }
    let kth = raw[order[k - 1]];
    match order[k..].iter().map(|&i| raw[i]).find(|&s| s > kth) {
        Some(next) => {
            let mid = 0.5 * (kth + next);
            if mid > kth {
                mid
            } else {
                next
            }
        }
        None => kth + f64::EPSILON * kth.abs().max(1.0),
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 || x.ncols() == 0 {
            return Err(LedgerError::ModelFitting(
                "isolation forest needs at least one sample and one feature".to_string(),
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(LedgerError::ModelFitting(
                "feature contains non-finite values".to_string(),
            ));
        }

        let samples_per_tree = self.max_samples.min(n_samples);

        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        // Maximum tree height
        let max_height = (samples_per_tree as f64).log2().ceil() as usize;

        let trees: Vec<IsolationTree> = (0..self.n_estimators)
            .map(|_| {
                let indices = index::sample(&mut rng, n_samples, samples_per_tree).into_vec();
                IsolationTree::build(x, &indices, 0, max_height, &mut rng)
            })
            .collect();

        self.trees = Some(trees);
        self.sample_size = Some(samples_per_tree);

        let raw = self.score_samples(x)?;
        let order = ranked_ascending(&raw);
        let offset = offset_above_kth(&raw, &order, self.n_flagged(n_samples));
        self.offset = Some(offset);

        debug!(
            n_estimators = self.n_estimators,
            samples_per_tree,
            max_height,
            offset,
            "Fitted isolation forest"
        );
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let offset = self.offset.ok_or(LedgerError::ModelNotFitted)?;
        Ok(self.score_samples(x)?.mapv(|s| s - offset))
    }

    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<i32>> {
        Ok(self.fit_detect(x)?.labels)
    }

    fn threshold(&self) -> f64 {
        self.score_threshold.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_feature(values: &[f64]) -> Array2<f64> {
        Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap()
    }

    fn clustered_with_outliers() -> Array2<f64> {
        let mut values: Vec<f64> = (0..98).map(|i| 100.0 + (i % 20) as f64).collect();
        values.push(5_000.0);
        values.push(-3_000.0);
        one_feature(&values)
    }

    #[test]
    fn test_isolation_forest_basic() {
        let mut data = Vec::new();
        for i in 0..50 {
            data.push((i % 10) as f64);
            data.push(((i % 10) + 1) as f64);
        }
        data.extend_from_slice(&[100.0, 100.0]);
        data.extend_from_slice(&[-50.0, -50.0]);
        let x = Array2::from_shape_vec((52, 2), data).unwrap();

        let mut iforest = IsolationForest::new()
            .with_n_estimators(50)
            .with_contamination(0.05)
            .with_seed(42);

        let result = iforest.fit_detect(&x).unwrap();

        // Outliers should score lower
        assert!(result.scores[50] < result.scores[0]);
        assert!(result.scores[51] < result.scores[0]);
        assert_eq!(result.n_anomalies, 3); // round(0.05 * 52)
        assert_eq!(result.labels[50], OUTLIER);
        assert_eq!(result.labels[51], OUTLIER);
    }

    #[test]
    fn test_contamination_fixes_anomaly_count() {
        let x = clustered_with_outliers();
        for contamination in [0.01, 0.02, 0.05, 0.1] {
            let mut iforest = IsolationForest::new()
                .with_contamination(contamination)
                .with_seed(7);
            let labels = iforest.fit_predict(&x).unwrap();
            let expected = (contamination * 100.0_f64).round() as usize;
            assert_eq!(labels.iter().filter(|&&l| l == OUTLIER).count(), expected);
        }
    }

    #[test]
    fn test_flagged_rows_have_negative_scores() {
        let x = clustered_with_outliers();
        let mut iforest = IsolationForest::new().with_contamination(0.02).with_seed(1);
        let result = iforest.fit_detect(&x).unwrap();

        assert_eq!(result.anomaly_indices(), vec![98, 99]);
        for i in result.anomaly_indices() {
            assert!(result.scores[i] < 0.0);
        }
    }

    #[test]
    fn test_seed_makes_fit_deterministic() {
        let x = clustered_with_outliers();
        let mut a = IsolationForest::new().with_seed(42);
        let mut b = IsolationForest::new().with_seed(42);
        let ra = a.fit_detect(&x).unwrap();
        let rb = b.fit_detect(&x).unwrap();
        assert_eq!(ra.scores, rb.scores);
        assert_eq!(ra.labels, rb.labels);
    }

    #[test]
    fn test_detect_matches_fit_labels() {
        let x = clustered_with_outliers();
        let mut iforest = IsolationForest::new().with_contamination(0.02).with_seed(11);
        let fitted = iforest.fit_detect(&x).unwrap();
        let detected = iforest.detect(&x).unwrap();

        assert_eq!(detected.labels, fitted.labels);
        assert_eq!(detected.n_anomalies, 2);
        assert_eq!(iforest.predict(&x).unwrap(), fitted.labels);
    }

    #[test]
    fn test_tied_boundary_scores_stay_negative() {
        let mut values = vec![1000.0; 4];
        values.extend(std::iter::repeat(1.0).take(36));
        let x = one_feature(&values);

        let mut iforest = IsolationForest::new().with_contamination(0.05).with_seed(0);
        let result = iforest.fit_detect(&x).unwrap();

        // round(0.05 * 40) = 2, taken in row order among the four tied rows
        assert_eq!(result.anomaly_indices(), vec![0, 1]);
        for i in result.anomaly_indices() {
            assert!(result.scores[i] < 0.0);
        }

        // The sign of the decision score cannot split identical rows
        let predicted = iforest.predict(&x).unwrap();
        let flagged: Vec<usize> = (0..40).filter(|&i| predicted[i] == OUTLIER).collect();
        assert_eq!(flagged, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_offset_skips_tied_scores() {
        let raw = Array1::from_vec(vec![-0.7, -0.5, -0.5, -0.4]);
        let order = ranked_ascending(&raw);

        assert_eq!(offset_above_kth(&raw, &order, 0), -0.7);
        assert!((offset_above_kth(&raw, &order, 1) - (-0.6)).abs() < 1e-12);
        assert!((offset_above_kth(&raw, &order, 2) - (-0.45)).abs() < 1e-12);
        assert!(offset_above_kth(&raw, &order, 4) > -0.4);
    }

    #[test]
    fn test_score_threshold_policy() {
        let x = clustered_with_outliers();
        let mut iforest = IsolationForest::new()
            .with_contamination(0.05)
            .with_score_threshold(Some(-0.17))
            .with_seed(3);
        let result = iforest.fit_detect(&x).unwrap();

        assert_eq!(result.threshold, -0.17);
        for (score, label) in result.scores.iter().zip(result.labels.iter()) {
            assert_eq!(*label == OUTLIER, *score < -0.17);
        }
    }

    #[test]
    fn test_constant_feature() {
        let x = one_feature(&[3.0; 40]);
        let mut iforest = IsolationForest::new().with_contamination(0.05).with_seed(0);
        let result = iforest.fit_detect(&x).unwrap();
        // Identical scores: the ranking falls back to row order
        assert_eq!(result.anomaly_indices(), vec![0, 1]);
    }

    #[test]
    fn test_empty_input_fails() {
        let x = Array2::<f64>::zeros((0, 1));
        let mut iforest = IsolationForest::new();
        assert!(matches!(iforest.fit(&x), Err(LedgerError::ModelFitting(_))));
    }

    #[test]
    fn test_unfitted_model() {
        let iforest = IsolationForest::new();
        assert!(matches!(
            iforest.decision_function(&one_feature(&[1.0])),
            Err(LedgerError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_isolation_tree_path_length() {
        let x = Array2::from_shape_vec(
            (10, 2),
            vec![
                1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0,
                6.0, 6.0, 7.0, 7.0, 8.0, 8.0, 9.0, 9.0, 10.0, 10.0,
            ],
        )
        .unwrap();

        let indices: Vec<usize> = (0..10).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let tree = IsolationTree::build(&x, &indices, 0, 10, &mut rng);

        assert!(tree.path_length(&[5.0, 5.0]) > 0.0);
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ≈ 10.24
        assert!((average_path_length(256) - 10.244).abs() < 0.01);
    }
}
