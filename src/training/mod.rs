//! Model selection: cross-validation splits and hyperparameter grid search

mod cross_validation;
mod grid_search;

pub use cross_validation::{CVSplit, KFold};
pub use grid_search::{CandidateScore, DbscanGridSearch, DbscanParams, GridSearchResult};
