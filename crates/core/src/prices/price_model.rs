//! Price oracle domain models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closing price (or FX rate) for one symbol on one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub price: Decimal,
    pub currency: String,
    /// True when this point was not quoted for `date` but carried forward
    /// from the most recent prior quote.
    #[serde(default)]
    pub carried_forward: bool,
}
