//! Database models for history records and metadata.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use foliocache_core::constants::DECIMAL_PRECISION;
use foliocache_core::valuation::{
    CalculationStatus, HistoryMetadata, PortfolioHistoryRecord, ValuationTotals,
};
use rust_decimal::Decimal;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Database model for one daily history record. Decimals are stored as
/// TEXT, positions and cash balances as packed JSON.
#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::portfolio_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct PortfolioHistoryRecordDB {
    pub id: String,
    pub portfolio_id: String,
    pub history_date: NaiveDate,
    pub positions: String,
    pub cash_balances: String,
    pub market_value_base: String,
    pub invested_base: String,
    pub result_base: String,
    pub today_result_base: String,
    pub stale_symbols: String,
    pub computed_at: String,
}

impl From<PortfolioHistoryRecordDB> for PortfolioHistoryRecord {
    fn from(db: PortfolioHistoryRecordDB) -> Self {
        Self {
            id: db.id,
            portfolio_id: db.portfolio_id,
            date: db.history_date,
            positions: serde_json::from_str(&db.positions).unwrap_or_default(),
            cash_balances: serde_json::from_str(&db.cash_balances).unwrap_or_default(),
            totals: ValuationTotals {
                market_value_base: Decimal::from_str(&db.market_value_base).unwrap_or_default(),
                invested_base: Decimal::from_str(&db.invested_base).unwrap_or_default(),
                result_base: Decimal::from_str(&db.result_base).unwrap_or_default(),
                today_result_base: Decimal::from_str(&db.today_result_base).unwrap_or_default(),
            },
            stale_symbols: serde_json::from_str(&db.stale_symbols).unwrap_or_default(),
            computed_at: parse_timestamp(&db.computed_at),
        }
    }
}

impl From<PortfolioHistoryRecord> for PortfolioHistoryRecordDB {
    fn from(domain: PortfolioHistoryRecord) -> Self {
        Self {
            id: domain.id,
            portfolio_id: domain.portfolio_id,
            history_date: domain.date,
            positions: serde_json::to_string(&domain.positions)
                .unwrap_or_else(|_| "[]".to_string()),
            cash_balances: serde_json::to_string(&domain.cash_balances)
                .unwrap_or_else(|_| "{}".to_string()),
            market_value_base: domain
                .totals
                .market_value_base
                .round_dp(DECIMAL_PRECISION)
                .to_string(),
            invested_base: domain
                .totals
                .invested_base
                .round_dp(DECIMAL_PRECISION)
                .to_string(),
            result_base: domain
                .totals
                .result_base
                .round_dp(DECIMAL_PRECISION)
                .to_string(),
            today_result_base: domain
                .totals
                .today_result_base
                .round_dp(DECIMAL_PRECISION)
                .to_string(),
            stale_symbols: serde_json::to_string(&domain.stale_symbols)
                .unwrap_or_else(|_| "[]".to_string()),
            computed_at: domain.computed_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Database model for per-portfolio metadata.
#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::portfolio_history_metadata)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct HistoryMetadataDB {
    pub portfolio_id: String,
    pub date_from: Option<NaiveDate>,
    pub date_till: Option<NaiveDate>,
    pub total_records: i64,
    pub last_updated: String,
    pub calculation_status: String,
}

impl From<HistoryMetadataDB> for HistoryMetadata {
    fn from(db: HistoryMetadataDB) -> Self {
        let calculation_status =
            CalculationStatus::from_str(&db.calculation_status).unwrap_or_else(|e| {
                log::error!("Bad calculation_status in DB: {}", e);
                CalculationStatus::Never
            });
        Self {
            portfolio_id: db.portfolio_id,
            date_from: db.date_from,
            date_till: db.date_till,
            total_records: db.total_records,
            last_updated: parse_timestamp(&db.last_updated),
            calculation_status,
        }
    }
}

impl From<HistoryMetadata> for HistoryMetadataDB {
    fn from(domain: HistoryMetadata) -> Self {
        Self {
            portfolio_id: domain.portfolio_id,
            date_from: domain.date_from,
            date_till: domain.date_till,
            total_records: domain.total_records,
            last_updated: domain.last_updated.format(TIMESTAMP_FORMAT).to_string(),
            calculation_status: domain.calculation_status.as_str().to_string(),
        }
    }
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|e| {
            log::error!("Failed to parse DB timestamp '{}': {}", raw, e);
            Utc::now()
        })
}
