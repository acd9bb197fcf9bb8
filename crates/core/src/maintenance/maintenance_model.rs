//! Configuration and reporting models for the maintenance job.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BATCH_PAUSE_MS, DEFAULT_MAINTENANCE_BATCH_SIZE};

/// Tuning knobs for the daily maintenance run.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Portfolios recalculated concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches, bounding sustained store/oracle load.
    pub batch_pause_ms: u64,
    /// Records older than this many days are pruned. `None` keeps everything.
    pub retention_days: Option<i64>,
    /// UTC wall-clock time `run_on_schedule` fires at, once per day.
    pub run_at_utc: NaiveTime,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_MAINTENANCE_BATCH_SIZE,
            batch_pause_ms: DEFAULT_BATCH_PAUSE_MS,
            retention_days: None,
            run_at_utc: NaiveTime::from_hms_opt(5, 0, 0).expect("valid time"),
        }
    }
}

/// Aggregate report of one maintenance run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceSummary {
    pub portfolios_processed: usize,
    /// Portfolios whose update completed without touching any record.
    pub portfolios_skipped: usize,
    pub portfolios_with_errors: usize,
    pub total_records_updated: usize,
    pub gaps_detected: usize,
    pub gaps_filled: usize,
    pub old_records_cleaned: usize,
    pub duration_ms: u64,
}
