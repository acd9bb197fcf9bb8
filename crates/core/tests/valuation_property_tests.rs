//! Property-based integration tests for the valuation engine.
//!
//! These verify the replay and valuation invariants across generated
//! ledgers, using the `proptest` crate for random test case generation.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;

use foliocache_core::fx::DailyRateMap;
use foliocache_core::ledger::{Trade, TradeType};
use foliocache_core::prices::PricePoint;
use foliocache_core::valuation::{value_holdings, HoldingsState};

// =============================================================================
// Generators
// =============================================================================

fn arb_trade_type() -> impl Strategy<Value = TradeType> {
    prop_oneof![
        Just(TradeType::Buy),
        Just(TradeType::Sell),
        Just(TradeType::Deposit),
        Just(TradeType::Dividend),
    ]
}

fn arb_symbol() -> impl Strategy<Value = String> {
    prop_oneof![Just("AAPL".to_string()), Just("MSFT".to_string())]
}

/// A valid trade on some day in January 2024, in USD.
fn arb_trade() -> impl Strategy<Value = Trade> {
    (
        arb_trade_type(),
        arb_symbol(),
        1u32..=28,
        1i64..=1000,
        1i64..=500,
        0i64..=5,
    )
        .prop_map(|(trade_type, symbol, day, quantity, unit_price, fee)| {
            let has_symbol = matches!(trade_type, TradeType::Buy | TradeType::Sell);
            Trade {
                id: String::new(),
                portfolio_id: "p1".to_string(),
                symbol: has_symbol.then_some(symbol),
                trade_type,
                trade_date: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
                sequence: 0,
                quantity: Decimal::from(quantity),
                unit_price: Decimal::from(unit_price),
                fee: Decimal::from(fee),
                amount: None,
                currency: "USD".to_string(),
            }
        })
}

fn arb_ledger() -> impl Strategy<Value = Vec<Trade>> {
    prop::collection::vec(arb_trade(), 1..40).prop_map(|mut trades| {
        for (i, trade) in trades.iter_mut().enumerate() {
            trade.sequence = i as i64;
            trade.id = format!("t{}", i);
        }
        trades
    })
}

fn price_map_for(state: &HoldingsState) -> HashMap<String, PricePoint> {
    state
        .held_symbols()
        .map(|symbol| {
            let point = PricePoint {
                symbol: symbol.to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                price: Decimal::from(100),
                currency: "USD".to_string(),
                carried_forward: false,
            };
            (symbol.to_string(), point)
        })
        .collect()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Seeding the replay state with a prefix and applying the suffix must
    /// land in the same state as replaying the whole ledger at once. This
    /// is what makes incremental recomputation sound.
    #[test]
    fn split_replay_matches_full_replay(trades in arb_ledger(), split_day in 1u32..=28) {
        let split = NaiveDate::from_ymd_opt(2024, 1, split_day).unwrap();
        let full = HoldingsState::from_trades(&trades);

        let (past, window): (Vec<Trade>, Vec<Trade>) =
            trades.iter().cloned().partition(|t| t.trade_day() < split);
        let mut seeded = HoldingsState::from_trades(&past);
        seeded.apply_trades(&window);

        prop_assert_eq!(full, seeded);
    }

    /// Replaying the same ledger twice yields identical state.
    #[test]
    fn replay_is_deterministic(trades in arb_ledger()) {
        let first = HoldingsState::from_trades(&trades);
        let second = HoldingsState::from_trades(&trades);
        prop_assert_eq!(first, second);
    }

    /// Totals are exactly the sums of their parts: market value includes
    /// cash, and the result is market value minus invested plus realized,
    /// summed over open positions.
    #[test]
    fn valuation_totals_are_sums_of_parts(trades in arb_ledger()) {
        let state = HoldingsState::from_trades(&trades);
        let prices = price_map_for(&state);
        let rates = DailyRateMap::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        let record = value_holdings("p1", &state, &prices, &rates, date, "USD").unwrap();

        let positions_mv: Decimal = record.positions.iter().map(|p| p.market_value_base).sum();
        let cash: Decimal = record.cash_balances.values().map(|c| c.amount).sum();
        let invested: Decimal = record.positions.iter().map(|p| p.invested_base).sum();
        let realized: Decimal = record.positions.iter().map(|p| p.realized_base).sum();

        prop_assert_eq!(record.totals.market_value_base, positions_mv + cash);
        prop_assert_eq!(record.totals.invested_base, invested);
        prop_assert_eq!(record.totals.result_base, positions_mv - invested + realized);
    }
}
