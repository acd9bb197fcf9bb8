//! Repository trait for the persisted history store.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::Result;
use crate::valuation::{CalculationStatus, HistoryMetadata, PortfolioHistoryRecord};

/// Persistence for per-day valuation records and per-portfolio metadata.
///
/// Writes are transactional per call: `commit_history` and
/// `delete_records_before` must leave metadata derivable from the record set
/// (date range, record count recomputed inside the same commit). Reads are
/// plain pooled lookups.
#[async_trait]
pub trait HistoryStoreTrait: Send + Sync {
    /// Upserts `records` (keyed by portfolio+date), recomputes the
    /// portfolio's metadata from the stored record set, stamps
    /// `last_updated = now` and `status`, all in one logical commit. With
    /// `replace_all` the portfolio's existing records are deleted first
    /// (full recalculation). Returns the refreshed metadata.
    async fn commit_history(
        &self,
        portfolio_id: &str,
        records: &[PortfolioHistoryRecord],
        status: CalculationStatus,
        replace_all: bool,
    ) -> Result<HistoryMetadata>;

    /// Updates only the calculation status, creating an empty metadata row
    /// if the portfolio has none yet. Does not touch `last_updated`.
    async fn set_status(&self, portfolio_id: &str, status: CalculationStatus) -> Result<()>;

    /// Records for a portfolio within the optional date bounds, ascending
    /// by date.
    fn get_records(
        &self,
        portfolio_id: &str,
        from: Option<NaiveDate>,
        till: Option<NaiveDate>,
    ) -> Result<Vec<PortfolioHistoryRecord>>;

    /// The single record for one day, if present.
    fn get_record_on(
        &self,
        portfolio_id: &str,
        date: NaiveDate,
    ) -> Result<Option<PortfolioHistoryRecord>>;

    fn get_metadata(&self, portfolio_id: &str) -> Result<Option<HistoryMetadata>>;

    fn latest_record_date(&self, portfolio_id: &str) -> Result<Option<NaiveDate>>;

    /// Every portfolio with at least one stored record.
    fn portfolio_ids_with_history(&self) -> Result<Vec<String>>;

    /// Deletes records strictly older than `cutoff` and refreshes metadata
    /// in the same commit. Returns the number of deleted records.
    async fn delete_records_before(&self, portfolio_id: &str, cutoff: NaiveDate)
        -> Result<usize>;
}
