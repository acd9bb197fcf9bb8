/// Canonical date format for valuation dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Decimal precision used when rounding for presentation.
pub const DECIMAL_PRECISION: u32 = 6;

/// How far before a requested range the price fill looks for an initial
/// carry-forward price.
pub const PRICE_LOOKBACK_DAYS: i64 = 30;

/// Default trailing window (days) recomputed by an incremental update to
/// absorb backdated trades.
pub const DEFAULT_SAFETY_WINDOW_DAYS: i64 = 1;

/// Default number of portfolios recalculated concurrently by the
/// maintenance job.
pub const DEFAULT_MAINTENANCE_BATCH_SIZE: usize = 5;

/// Default pause between maintenance batches, bounding sustained load on the
/// history store and the price oracle.
pub const DEFAULT_BATCH_PAUSE_MS: u64 = 250;
