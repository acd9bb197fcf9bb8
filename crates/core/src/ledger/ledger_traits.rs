//! Trait for the external ledger collaborator.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::Trade;
use crate::errors::Result;

/// Read-only access to a portfolio's trade ledger.
///
/// Implementations must return trades ordered by trade time, then by
/// insertion sequence; the replay path re-sorts defensively but relies on
/// the ledger for the canonical order.
#[async_trait]
pub trait LedgerReaderTrait: Send + Sync {
    /// All trades for the portfolio with a trade day on or before `until`.
    async fn trades_until(&self, portfolio_id: &str, until: NaiveDate) -> Result<Vec<Trade>>;

    /// Day of the portfolio's earliest trade, if it has any.
    async fn earliest_trade_date(&self, portfolio_id: &str) -> Result<Option<NaiveDate>>;

    /// The portfolio's reporting (base) currency.
    async fn portfolio_base_currency(&self, portfolio_id: &str) -> Result<String>;
}
