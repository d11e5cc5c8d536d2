//! Cross-validated grid search over DBSCAN hyperparameters
//!
//! DBSCAN has no target to regress against, so each validation row is
//! "predicted" by the mean of the training cluster it falls into (or by the
//! training mean when it lands in noise) and candidates are ranked by the
//! negative mean squared error of those predictions. This mirrors a
//! regression-style `neg_mean_squared_error` search applied to a clustering
//! model: it is reproducible, but not a principled quality measure for
//! density clustering.

use std::collections::HashMap;

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clustering::{DBSCAN, NOISE};
use crate::error::{LedgerError, Result};

use super::KFold;

/// One (eps, min_samples) combination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    pub eps: f64,
    pub min_samples: usize,
}

/// Cross-validated score of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: DbscanParams,
    /// Negative MSE per fold
    pub fold_scores: Vec<f64>,
    /// Mean of the fold scores (higher is better)
    pub mean_score: f64,
}

/// Outcome of a grid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub best_params: DbscanParams,
    pub best_score: f64,
    /// Every candidate, in grid order
    pub candidates: Vec<CandidateScore>,
}

/// Exhaustive search over `eps × min_samples`
#[derive(Debug, Clone)]
pub struct DbscanGridSearch {
    eps_candidates: Vec<f64>,
    min_samples_candidates: Vec<usize>,
    cv: KFold,
}

impl DbscanGridSearch {
    pub fn new(eps_candidates: Vec<f64>, min_samples_candidates: Vec<usize>, cv: KFold) -> Self {
        Self {
            eps_candidates,
            min_samples_candidates,
            cv,
        }
    }

    /// Candidates in grid order: eps-major, then min_samples
    pub fn candidates(&self) -> Vec<DbscanParams> {
        self.eps_candidates
            .iter()
            .flat_map(|&eps| {
                self.min_samples_candidates
                    .iter()
                    .map(move |&min_samples| DbscanParams { eps, min_samples })
            })
            .collect()
    }

    /// Score every candidate and pick the highest mean score. Ties keep the
    /// earlier candidate.
    pub fn fit(&self, x: &Array2<f64>) -> Result<GridSearchResult> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Err(LedgerError::ModelFitting(
                "grid search needs at least one candidate".to_string(),
            ));
        }

        let splits = self.cv.split(x.nrows())?;
        info!(
            n_candidates = candidates.len(),
            n_folds = splits.len(),
            n_samples = x.nrows(),
            "Grid search started with neg_mean_squared_error"
        );

        let scored: Vec<CandidateScore> = candidates
            .par_iter()
            .map(|&params| {
                let fold_scores = splits
                    .iter()
                    .map(|split| {
                        let train = x.select(Axis(0), &split.train_indices);
                        let test = x.select(Axis(0), &split.test_indices);
                        neg_mean_squared_error(params, &train, &test)
                    })
                    .collect::<Result<Vec<f64>>>()?;
                let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                debug!(
                    eps = params.eps,
                    min_samples = params.min_samples,
                    mean_score,
                    "Scored candidate"
                );
                Ok(CandidateScore {
                    params,
                    fold_scores,
                    mean_score,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut best = &scored[0];
        for candidate in &scored[1..] {
            if candidate.mean_score > best.mean_score {
                best = candidate;
            }
        }
        let best_params = best.params;
        let best_score = best.mean_score;

        info!(
            eps = best_params.eps,
            min_samples = best_params.min_samples,
            best_score,
            "Best params"
        );

        Ok(GridSearchResult {
            best_params,
            best_score,
            candidates: scored,
        })
    }
}

/// Fit on `train`, assign `test` rows to clusters and score the cluster-mean
/// reconstruction of `test`
fn neg_mean_squared_error(params: DbscanParams, train: &Array2<f64>, test: &Array2<f64>) -> Result<f64> {
    let mut model = DBSCAN::new(params.eps, params.min_samples);
    let train_labels = model.fit_predict(train)?;
    let test_labels = model.predict(test)?;

    let overall_mean = train
        .mean_axis(Axis(0))
        .ok_or_else(|| LedgerError::ModelFitting("empty training fold".to_string()))?;
    let cluster_means = cluster_means(train, &train_labels);

    let mut squared_error = 0.0;
    for (row, label) in test.outer_iter().zip(test_labels.iter()) {
        let prediction = if *label == NOISE {
            &overall_mean
        } else {
            cluster_means.get(label).unwrap_or(&overall_mean)
        };
        squared_error += row
            .iter()
            .zip(prediction.iter())
            .map(|(v, p)| (v - p).powi(2))
            .sum::<f64>();
    }

    let n_values = (test.nrows() * test.ncols()).max(1) as f64;
    Ok(-(squared_error / n_values))
}

fn cluster_means(x: &Array2<f64>, labels: &Array1<i64>) -> HashMap<i64, Array1<f64>> {
    let mut sums: HashMap<i64, (Array1<f64>, usize)> = HashMap::new();
    for (row, &label) in x.outer_iter().zip(labels.iter()) {
        if label == NOISE {
            continue;
        }
        let entry = sums
            .entry(label)
            .or_insert_with(|| (Array1::zeros(x.ncols()), 0));
        entry.0 += &row;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(label, (sum, count))| (label, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> Array2<f64> {
        let values: Vec<f64> = (0..10)
            .map(|i| i as f64 * 0.01)
            .chain((0..10).map(|i| 10.0 + i as f64 * 0.01))
            .collect();
        Array2::from_shape_vec((values.len(), 1), values).unwrap()
    }

    #[test]
    fn test_candidates_in_grid_order() {
        let search = DbscanGridSearch::new(vec![0.3, 0.5], vec![10, 15, 20], KFold::new(5));
        let candidates = search.candidates();
        assert_eq!(candidates.len(), 6);
        assert_eq!(candidates[0], DbscanParams { eps: 0.3, min_samples: 10 });
        assert_eq!(candidates[2], DbscanParams { eps: 0.3, min_samples: 20 });
        assert_eq!(candidates[3], DbscanParams { eps: 0.5, min_samples: 10 });
    }

    #[test]
    fn test_prefers_radius_that_separates_groups() {
        let search = DbscanGridSearch::new(vec![20.0, 0.5], vec![3], KFold::new(5));
        let result = search.fit(&two_groups()).unwrap();

        assert_eq!(result.best_params, DbscanParams { eps: 0.5, min_samples: 3 });
        assert!(result.best_score > -0.01);
        // A single all-encompassing cluster predicts roughly the global mean
        assert!(result.candidates[0].mean_score < -10.0);
        assert_eq!(result.candidates[0].fold_scores.len(), 5);
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        let search = DbscanGridSearch::new(vec![0.5, 0.6], vec![3, 4], KFold::new(5));
        let result = search.fit(&two_groups()).unwrap();
        assert_eq!(result.best_params, DbscanParams { eps: 0.5, min_samples: 3 });
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        let x = Array2::from_shape_vec((3, 1), vec![0.0, 1.0, 2.0]).unwrap();
        let search = DbscanGridSearch::new(vec![0.5], vec![2], KFold::new(5));
        assert!(matches!(search.fit(&x), Err(LedgerError::ModelFitting(_))));
    }
}
