//! Request/response models for the history cache service.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SAFETY_WINDOW_DAYS;
use crate::valuation::PortfolioHistoryRecord;

/// Tuning knobs for the cache service.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Trailing days an incremental update recomputes below the last cached
    /// date, absorbing backdated trades without a full recalculation.
    pub safety_window_days: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            safety_window_days: DEFAULT_SAFETY_WINDOW_DAYS,
        }
    }
}

/// Result of a `get_history` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub days: Vec<PortfolioHistoryRecord>,
    /// True when served straight from the store without recomputation.
    pub cached: bool,
    /// Minutes since the snapshot set was last updated; 0 after a recompute.
    pub cache_age_minutes: i64,
}

/// Result of an `update_history` call. Errors are carried as data so batch
/// callers (the maintenance job) can aggregate without aborting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub success: bool,
    pub records_updated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateOutcome {
    pub fn ok(records_updated: usize) -> Self {
        Self {
            success: true,
            records_updated,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            records_updated: 0,
            error: Some(error.into()),
        }
    }
}
