//! Trait for the external price oracle collaborator.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;

use super::PricePoint;
use crate::errors::Result;

/// Daily closing prices and FX rates, keyed by symbol and date.
///
/// FX rates are quoted as prices of FX-pair symbols
/// (see [`crate::fx::fx_pair_symbol`]). The oracle may return gaps for
/// non-trading days; callers fill them with
/// [`super::fill_missing_prices`].
#[async_trait]
pub trait PriceOracleTrait: Send + Sync {
    /// Prices for the given symbols with dates in `[start, end]`, in no
    /// particular order. Symbols the oracle has never quoted are simply
    /// absent from the result.
    async fn prices_in_range(
        &self,
        symbols: &HashSet<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>>;
}
