//! Integration test: load → detect → report over the bundled fixture

use ledgerwatch::clustering::{DBSCAN, NOISE};
use ledgerwatch::config::ReportConfig;
use ledgerwatch::dataset::DatasetLoader;
use ledgerwatch::detection::Strategy;
use ledgerwatch::preprocessing::StandardScaler;
use ledgerwatch::report::generate_report;
use ledgerwatch::training::{DbscanGridSearch, KFold};
use ndarray::Array2;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/transactions_dataset.csv");

fn fixture_config() -> ReportConfig {
    ReportConfig::with_dataset(FIXTURE)
}

#[test]
fn test_fixture_loads() {
    let rows = DatasetLoader::new(FIXTURE).load().unwrap();
    assert_eq!(rows.len(), 1000);
    assert_eq!(rows[0].transaction_id, "TXN00001");
    assert!(rows.iter().all(|t| !t.country.is_empty() && !t.date.is_empty()));
}

#[test]
fn test_isolation_forest_count_tracks_contamination() {
    for (contamination, expected) in [(0.01, 10), (0.02, 20)] {
        let mut config = fixture_config();
        config.isolation_forest.contamination = contamination;
        let report = generate_report(Strategy::IsolationForest, &config).unwrap();
        assert_eq!(report.len(), expected);
    }
}

#[test]
fn test_report_keeps_dataset_order() {
    let rows = DatasetLoader::new(FIXTURE).load().unwrap();
    for strategy in Strategy::ALL {
        let report = generate_report(strategy, &fixture_config()).unwrap();
        let positions: Vec<usize> = report
            .anomalies
            .iter()
            .map(|a| rows.iter().position(|r| r == a).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_strategies_agree_on_fixture() {
    let forest = generate_report(Strategy::IsolationForest, &fixture_config()).unwrap();
    let dbscan = generate_report(Strategy::Dbscan, &fixture_config()).unwrap();
    assert_eq!(forest, dbscan);
}

#[test]
fn test_dbscan_report_rows_are_noise_under_selected_params() {
    let config = fixture_config();
    let rows = DatasetLoader::new(FIXTURE).load().unwrap();
    let amounts: Vec<f64> = rows.iter().map(|r| r.amount).collect();
    let x = Array2::from_shape_vec((amounts.len(), 1), amounts).unwrap();
    let scaled = StandardScaler::new().fit_transform(&x).unwrap();

    let best = DbscanGridSearch::new(
        config.dbscan.eps_candidates.clone(),
        config.dbscan.min_samples_candidates.clone(),
        KFold::new(config.dbscan.cv_folds),
    )
    .fit(&scaled)
    .unwrap()
    .best_params;
    let labels = DBSCAN::new(best.eps, best.min_samples).fit_predict(&scaled).unwrap();

    let report = generate_report(Strategy::Dbscan, &config).unwrap();
    for anomaly in &report.anomalies {
        let i = rows.iter().position(|r| r == anomaly).unwrap();
        assert_eq!(labels[i], NOISE);
    }
    assert_eq!(labels.iter().filter(|&&l| l == NOISE).count(), report.len());
}

#[test]
fn test_score_threshold_policy_on_fixture() {
    let mut config = fixture_config();
    config.isolation_forest.contamination = 0.05;
    config.isolation_forest.score_threshold = Some(-0.17);

    let scored = Strategy::IsolationForest
        .score(&DatasetLoader::new(FIXTURE).load().unwrap(), &config)
        .unwrap();
    for row in &scored {
        assert_eq!(row.is_anomalous(), row.score.unwrap() < -0.17);
    }
}
