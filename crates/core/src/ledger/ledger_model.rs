//! Trade ledger domain models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of ledger entry.
///
/// Currency conversions are not a separate kind: they are `Buy`/`Sell`
/// entries whose symbol carries an FX-pair marker (see
/// [`crate::fx::parse_fx_symbol`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    Buy,
    Sell,
    Deposit,
    Withdrawal,
    Dividend,
    Interest,
    Fee,
    Unknown,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
            TradeType::Deposit => "DEPOSIT",
            TradeType::Withdrawal => "WITHDRAWAL",
            TradeType::Dividend => "DIVIDEND",
            TradeType::Interest => "INTEREST",
            TradeType::Fee => "FEE",
            TradeType::Unknown => "UNKNOWN",
        }
    }
}

impl FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeType::Buy),
            "SELL" => Ok(TradeType::Sell),
            "DEPOSIT" => Ok(TradeType::Deposit),
            "WITHDRAWAL" => Ok(TradeType::Withdrawal),
            "DIVIDEND" => Ok(TradeType::Dividend),
            "INTEREST" => Ok(TradeType::Interest),
            "FEE" => Ok(TradeType::Fee),
            other => Err(format!("unknown trade type '{}'", other)),
        }
    }
}

/// One entry of the append-only trade ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub portfolio_id: String,
    /// None for pure cash movements (deposits, withdrawals, fees, ...).
    pub symbol: Option<String>,
    pub trade_type: TradeType,
    pub trade_date: DateTime<Utc>,
    /// Insertion order within the ledger; tie-break for trades sharing a
    /// trade time so replay order is deterministic.
    pub sequence: i64,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    /// Cash amount for cash-only entries (deposit, withdrawal, dividend, ...).
    #[serde(default)]
    pub amount: Option<Decimal>,
    pub currency: String,
}

impl Trade {
    /// Calendar day the trade belongs to.
    pub fn trade_day(&self) -> NaiveDate {
        self.trade_date.date_naive()
    }

    /// Replay ordering key: trade time, then insertion order.
    pub fn ordering_key(&self) -> (DateTime<Utc>, i64) {
        (self.trade_date, self.sequence)
    }
}
