//! DBSCAN clustering

use crate::error::{LedgerError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Label of points that belong to no cluster
pub const NOISE: i64 = -1;

/// DBSCAN (Density-Based Spatial Clustering of Applications with Noise)
///
/// Points are classified as core, border, or noise:
/// - Core: has ≥ min_samples neighbors within eps radius (itself included)
/// - Border: within eps of a core point but not core itself
/// - Noise: neither core nor border (label = -1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DBSCAN {
    /// Maximum distance between neighbors
    pub eps: f64,
    /// Minimum points to form a dense region
    pub min_samples: usize,
    /// Assigned cluster labels (-1 = noise)
    pub labels: Option<Array1<i64>>,
    /// Number of clusters found (excluding noise)
    pub n_clusters_found: usize,
    /// Number of noise points
    pub n_noise: usize,
    pub is_fitted: bool,
    /// Indices of core points in the training data
    core_indices: Vec<usize>,
    /// Training data (needed for predict on new data)
    train_x: Option<Array2<f64>>,
}

impl Default for DBSCAN {
    fn default() -> Self {
        Self::new(0.5, 5)
    }
}

impl DBSCAN {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self {
            eps,
            min_samples,
            labels: None,
            n_clusters_found: 0,
            n_noise: 0,
            is_fitted: false,
            core_indices: Vec::new(),
            train_x: None,
        }
    }

    fn euclidean_dist(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
    }

    /// Find all neighbors within eps distance
    fn region_query(x: &Array2<f64>, point_idx: usize, eps: f64) -> Vec<usize> {
        let row = x.row(point_idx);
        (0..x.nrows())
            .filter(|&i| Self::euclidean_dist(&row, &x.row(i)) <= eps)
            .collect()
    }

    /// Fit the model (unsupervised)
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(LedgerError::ModelFitting(
                "DBSCAN needs at least one sample".to_string(),
            ));
        }
        if !(self.eps > 0.0) || self.min_samples == 0 {
            return Err(LedgerError::ModelFitting(format!(
                "invalid DBSCAN parameters: eps = {}, min_samples = {}",
                self.eps, self.min_samples
            )));
        }
        let eps = self.eps;
        let min_samples = self.min_samples;

        // Pre-compute neighbor lists for all points (parallelized)
        let neighbors: Vec<Vec<usize>> = (0..n_samples)
            .into_par_iter()
            .map(|i| Self::region_query(x, i, eps))
            .collect();

        let is_core: Vec<bool> = neighbors.iter().map(|n| n.len() >= min_samples).collect();

        let mut labels = vec![NOISE; n_samples];
        let mut cluster_id: i64 = 0;

        for i in 0..n_samples {
            if labels[i] != NOISE || !is_core[i] {
                continue;
            }

            // Expand cluster from core point i
            labels[i] = cluster_id;
            let mut queue: Vec<usize> = neighbors[i].clone();
            let mut head = 0;

            while head < queue.len() {
                let q = queue[head];
                head += 1;

                if labels[q] == NOISE {
                    labels[q] = cluster_id;
                }
                if !is_core[q] {
                    continue;
                }
                for &neighbor in &neighbors[q] {
                    if labels[neighbor] == NOISE {
                        labels[neighbor] = cluster_id;
                        queue.push(neighbor);
                    }
                }
            }

            cluster_id += 1;
        }

        self.n_noise = labels.iter().filter(|&&l| l == NOISE).count();
        self.labels = Some(Array1::from_vec(labels));
        self.n_clusters_found = cluster_id as usize;
        self.core_indices = (0..n_samples).filter(|&i| is_core[i]).collect();
        self.train_x = Some(x.clone());
        self.is_fitted = true;
        Ok(self)
    }

    /// Fit and return the training labels
    pub fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<i64>> {
        self.fit(x)?;
        self.labels.clone().ok_or(LedgerError::ModelNotFitted)
    }

    /// Assign new points to the cluster of their nearest core point within
    /// eps; anything farther is noise
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let train_x = self.train_x.as_ref().ok_or(LedgerError::ModelNotFitted)?;
        let train_labels = self.labels.as_ref().ok_or(LedgerError::ModelNotFitted)?;
        if x.ncols() != train_x.ncols() {
            return Err(LedgerError::ModelFitting(format!(
                "expected {} feature(s), got {}",
                train_x.ncols(),
                x.ncols()
            )));
        }

        let labels: Vec<i64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let mut best_label = NOISE;
                let mut best_dist = f64::MAX;
                for &j in &self.core_indices {
                    let d = Self::euclidean_dist(&row, &train_x.row(j));
                    if d <= self.eps && d < best_dist {
                        best_dist = d;
                        best_label = train_labels[j];
                    }
                }
                best_label
            })
            .collect();

        Ok(Array1::from_vec(labels))
    }

    /// Indices of the core points found during fit
    pub fn core_indices(&self) -> &[usize] {
        &self.core_indices
    }
}
