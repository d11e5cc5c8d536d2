//! Transaction records and dataset loading

mod loader;

pub use loader::{DatasetLoader, COLUMNS};

use serde::{Deserialize, Serialize};

/// A single row of the transaction dataset
///
/// Field names serialize to the dataset's column headers, which are also the
/// keys of every object in an anomaly report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "Transaction_ID")]
    pub transaction_id: String,

    #[serde(rename = "Date")]
    pub date: String,

    #[serde(rename = "Transaction_Amount")]
    pub amount: f64,

    #[serde(rename = "Country")]
    pub country: String,
}

impl Transaction {
    pub fn new(
        transaction_id: impl Into<String>,
        date: impl Into<String>,
        amount: f64,
        country: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            date: date.into(),
            amount,
            country: country.into(),
        }
    }
}
