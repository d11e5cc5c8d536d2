//! Application state management

use chrono::{DateTime, Utc};

use crate::config::ReportConfig;

/// Read-only state shared across handlers
///
/// Holds configuration only. Datasets and fitted models are never cached
/// here; every report request loads and fits from scratch.
pub struct AppState {
    pub report_config: ReportConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(report_config: ReportConfig) -> Self {
        Self {
            report_config,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}
