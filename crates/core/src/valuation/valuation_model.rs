//! Portfolio history domain models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::constants::DATE_FORMAT;

/// Valuation of a single open position on one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionValuation {
    pub symbol: String,
    pub volume: Decimal,
    pub local_currency: String,
    pub market_price_local: Decimal,
    pub market_value_local: Decimal,
    pub market_value_base: Decimal,
    pub invested_base: Decimal,
    pub realized_base: Decimal,
}

/// One cash balance with the rate used to express it in base currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CashBalance {
    pub amount: Decimal,
    pub rate_to_base: Decimal,
}

/// Portfolio-level aggregates, all in base currency.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValuationTotals {
    pub market_value_base: Decimal,
    pub invested_base: Decimal,
    pub result_base: Decimal,
    pub today_result_base: Decimal,
}

/// One portfolio's valuation snapshot for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioHistoryRecord {
    pub id: String,
    pub portfolio_id: String,
    pub date: NaiveDate,
    /// Open positions, ordered by symbol.
    pub positions: Vec<PositionValuation>,
    /// currency code -> balance with its base-conversion rate.
    pub cash_balances: HashMap<String, CashBalance>,
    pub totals: ValuationTotals,
    /// Symbols valued with a carried-forward price on this day.
    #[serde(default)]
    pub stale_symbols: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

impl PortfolioHistoryRecord {
    /// Composite record key: `{portfolio_id}_{YYYY-MM-DD}`.
    pub fn record_id(portfolio_id: &str, date: NaiveDate) -> String {
        format!("{}_{}", portfolio_id, date.format(DATE_FORMAT))
    }

    pub fn has_stale_prices(&self) -> bool {
        !self.stale_symbols.is_empty()
    }
}

/// Where a portfolio's cached history stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationStatus {
    #[default]
    Never,
    InProgress,
    Complete,
    Failed,
}

impl CalculationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationStatus::Never => "NEVER",
            CalculationStatus::InProgress => "IN_PROGRESS",
            CalculationStatus::Complete => "COMPLETE",
            CalculationStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for CalculationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NEVER" => Ok(CalculationStatus::Never),
            "IN_PROGRESS" => Ok(CalculationStatus::InProgress),
            "COMPLETE" => Ok(CalculationStatus::Complete),
            "FAILED" => Ok(CalculationStatus::Failed),
            other => Err(format!("unknown calculation status '{}'", other)),
        }
    }
}

/// Cached projection over a portfolio's stored records.
///
/// Never an independent source of truth: the store recomputes date range and
/// record count from the record table inside the same transaction that
/// writes records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMetadata {
    pub portfolio_id: String,
    pub date_from: Option<NaiveDate>,
    pub date_till: Option<NaiveDate>,
    pub total_records: i64,
    pub last_updated: DateTime<Utc>,
    pub calculation_status: CalculationStatus,
}

impl HistoryMetadata {
    /// Empty metadata for a portfolio that has never been calculated.
    pub fn never(portfolio_id: &str) -> Self {
        Self {
            portfolio_id: portfolio_id.to_string(),
            date_from: None,
            date_till: None,
            total_records: 0,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            calculation_status: CalculationStatus::Never,
        }
    }

    /// Minutes elapsed since the last successful update.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_updated).num_minutes()
    }
}
