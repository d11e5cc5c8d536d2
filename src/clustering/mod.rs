//! Density-based clustering
//!
//! Unsupervised models: they take X only and assign a cluster label per row.

mod dbscan;

pub use dbscan::{DBSCAN, NOISE};
