//! Daily valuation: pure functions from holdings, prices, and FX rates to a
//! [`PortfolioHistoryRecord`].

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::errors::{Result, ValuationError};
use crate::fx::{self, DailyRateMap};
use crate::ledger::Trade;
use crate::prices::PricePoint;
use crate::valuation::replay::HoldingsState;
use crate::valuation::valuation_model::{
    CashBalance, PortfolioHistoryRecord, PositionValuation, ValuationTotals,
};

/// Values a replayed holdings state for one day.
///
/// `prices_today` must already be carry-forward filled: a held symbol absent
/// from the map has never been priced at all, which is fatal
/// ([`ValuationError::NeverPriced`]). Carried-forward points flag the record
/// as stale instead.
///
/// `totals.today_result_base` is left at zero; the caller sets it against the
/// previous day's record.
pub fn value_holdings(
    portfolio_id: &str,
    state: &HoldingsState,
    prices_today: &HashMap<String, PricePoint>,
    rates_today: &DailyRateMap,
    date: NaiveDate,
    base_currency: &str,
) -> Result<PortfolioHistoryRecord> {
    let base_currency = fx::normalize_currency_code(base_currency);

    let mut positions = Vec::new();
    let mut stale_symbols = Vec::new();

    // BTreeMap iteration: positions come out ordered by symbol.
    for position in state.positions.values() {
        if position.volume.is_zero() {
            continue;
        }

        let point = prices_today.get(&position.symbol).ok_or_else(|| {
            ValuationError::NeverPriced {
                symbol: position.symbol.clone(),
                portfolio_id: portfolio_id.to_string(),
                date,
            }
        })?;
        if point.carried_forward {
            stale_symbols.push(position.symbol.clone());
        }

        let (price_local, local_currency) = fx::normalize_amount(point.price, &point.currency);
        let market_value_local = position.volume * price_local;
        let price_rate = fx::rate_from_map(rates_today, local_currency, base_currency, date)?;
        let market_value_base = market_value_local * price_rate;

        let position_currency = fx::normalize_currency_code(&position.currency);
        let position_rate =
            fx::rate_from_map(rates_today, position_currency, base_currency, date)?;
        let invested_base = position.invested_local * position_rate;
        let realized_base = position.realized_local * position_rate;

        positions.push(PositionValuation {
            symbol: position.symbol.clone(),
            volume: position.volume,
            local_currency: local_currency.to_string(),
            market_price_local: price_local,
            market_value_local,
            market_value_base,
            invested_base,
            realized_base,
        });
    }

    let mut cash_balances = HashMap::new();
    let mut cash_base = Decimal::ZERO;
    for (currency, amount) in &state.cash {
        let rate_to_base = fx::rate_from_map(rates_today, currency, base_currency, date)?;
        cash_base += *amount * rate_to_base;
        cash_balances.insert(
            currency.clone(),
            CashBalance {
                amount: *amount,
                rate_to_base,
            },
        );
    }

    // Totals are sums of the exposed per-position columns, so a record is
    // internally consistent down to the last digit even when average costs
    // carry a full-precision repeating expansion.
    let position_value: Decimal = positions.iter().map(|p| p.market_value_base).sum();
    let invested: Decimal = positions.iter().map(|p| p.invested_base).sum();
    let realized: Decimal = positions.iter().map(|p| p.realized_base).sum();
    let totals = ValuationTotals {
        market_value_base: position_value + cash_base,
        invested_base: invested,
        result_base: position_value - invested + realized,
        today_result_base: Decimal::ZERO,
    };

    Ok(PortfolioHistoryRecord {
        id: PortfolioHistoryRecord::record_id(portfolio_id, date),
        portfolio_id: portfolio_id.to_string(),
        date,
        positions,
        cash_balances,
        totals,
        stale_symbols,
        computed_at: Utc::now(),
    })
}

/// One-shot valuation: replay every trade up to and including `as_of`,
/// then value the resulting holdings. The incremental service path carries
/// the replay state across days instead of calling this per day.
pub fn compute_daily_valuation(
    portfolio_id: &str,
    as_of: NaiveDate,
    trades: &[Trade],
    prices_today: &HashMap<String, PricePoint>,
    rates_today: &DailyRateMap,
    base_currency: &str,
) -> Result<PortfolioHistoryRecord> {
    let up_to: Vec<Trade> = trades
        .iter()
        .filter(|t| t.trade_day() <= as_of)
        .cloned()
        .collect();
    let state = HoldingsState::from_trades(&up_to);
    value_holdings(
        portfolio_id,
        &state,
        prices_today,
        rates_today,
        as_of,
        base_currency,
    )
}

/// `today_result_base` for a record, given the previous day's totals.
pub fn today_result(current: &ValuationTotals, previous: Option<&ValuationTotals>) -> Decimal {
    match previous {
        Some(prev) => current.result_base - prev.result_base,
        None => Decimal::ZERO,
    }
}
