//! CSV dataset loader

use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{LedgerError, Result};

use super::Transaction;

/// Columns every transaction dataset must provide
pub const COLUMNS: [&str; 4] = ["Transaction_ID", "Date", "Transaction_Amount", "Country"];

/// Rows polars inspects when inferring column types
const INFER_SCHEMA_ROWS: usize = 100;

/// Reads the transaction dataset from disk
///
/// Nothing is cached: each call to [`DatasetLoader::load`] re-reads the file.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    path: PathBuf,
}

impl DatasetLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load every row, in file order
    pub fn load(&self) -> Result<Vec<Transaction>> {
        let start = Instant::now();
        let df = self.read_frame()?;

        let ids = string_column(&df, COLUMNS[0])?;
        let dates = string_column(&df, COLUMNS[1])?;
        let amounts = float_column(&df, COLUMNS[2])?;
        let countries = string_column(&df, COLUMNS[3])?;

        let transactions: Vec<Transaction> = ids
            .into_iter()
            .zip(dates)
            .zip(amounts)
            .zip(countries)
            .map(|(((transaction_id, date), amount), country)| Transaction {
                transaction_id,
                date,
                amount,
                country,
            })
            .collect();

        info!(
            path = %self.path.display(),
            rows = transactions.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded transaction dataset"
        );
        Ok(transactions)
    }

    fn read_frame(&self) -> Result<DataFrame> {
        let file = File::open(&self.path).map_err(|e| {
            LedgerError::DatasetUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| {
                LedgerError::MalformedDataset(format!("{}: {}", self.path.display(), e))
            })?;

        debug!(rows = df.height(), columns = df.width(), "Parsed CSV");
        Ok(df)
    }
}

fn column_series(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Series> {
    let column = df
        .column(name)
        .map_err(|_| LedgerError::MalformedDataset(format!("missing column '{}'", name)))?;
    Ok(column.as_materialized_series().cast(dtype)?)
}

fn null_at(name: &str, row: usize) -> LedgerError {
    LedgerError::MalformedDataset(format!("missing or invalid '{}' at row {}", name, row + 1))
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = column_series(df, name, &DataType::String)?;
    let values = series.str()?;
    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| v.map(str::to_string).ok_or_else(|| null_at(name, row)))
        .collect()
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    // Non-numeric cells become nulls on cast and are reported below
    let series = column_series(df, name, &DataType::Float64)?;
    let values = series.f64()?;
    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(x) if x.is_finite() => Ok(x),
            _ => Err(null_at(name, row)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_preserves_order_and_fields() {
        let file = write_csv(
            "Transaction_ID,Date,Transaction_Amount,Country,Channel\n\
             TXN1,2023-01-01,10.5,US,web\n\
             TXN2,2023-01-02,99,DE,pos\n\
             TXN3,2023-01-03,7.25,FR,web\n",
        );

        let rows = DatasetLoader::new(file.path()).load().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], Transaction::new("TXN1", "2023-01-01", 10.5, "US"));
        assert_eq!(rows[1].amount, 99.0);
        assert_eq!(rows[2].transaction_id, "TXN3");
    }

    #[test]
    fn test_numeric_ids_load_as_strings() {
        let file = write_csv(
            "Transaction_ID,Date,Transaction_Amount,Country\n\
             101,2023-01-01,1.0,US\n\
             102,2023-01-02,2.0,US\n",
        );

        let rows = DatasetLoader::new(file.path()).load().unwrap();
        assert_eq!(rows[0].transaction_id, "101");
        assert_eq!(rows[1].transaction_id, "102");
    }

    #[test]
    fn test_missing_file() {
        let err = DatasetLoader::new("/nonexistent/transactions.csv")
            .load()
            .unwrap_err();
        assert!(matches!(err, LedgerError::DatasetUnavailable(_)));
    }

    #[test]
    fn test_missing_column() {
        let file = write_csv(
            "Transaction_ID,Date,Country\n\
             TXN1,2023-01-01,US\n",
        );
        let err = DatasetLoader::new(file.path()).load().unwrap_err();
        assert!(matches!(err, LedgerError::MalformedDataset(ref m) if m.contains("Transaction_Amount")));
    }

    #[test]
    fn test_non_numeric_amount() {
        let file = write_csv(
            "Transaction_ID,Date,Transaction_Amount,Country\n\
             TXN1,2023-01-01,12.0,US\n\
             TXN2,2023-01-02,lots,US\n",
        );
        let err = DatasetLoader::new(file.path()).load().unwrap_err();
        assert!(matches!(err, LedgerError::MalformedDataset(_)));
    }
}
