use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::ledger::{Trade, TradeType};
use crate::valuation::replay::HoldingsState;

fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

fn trade(
    id: &str,
    symbol: Option<&str>,
    trade_type: TradeType,
    day: u32,
    sequence: i64,
    quantity: Decimal,
    unit_price: Decimal,
) -> Trade {
    Trade {
        id: id.to_string(),
        portfolio_id: "p1".to_string(),
        symbol: symbol.map(str::to_string),
        trade_type,
        trade_date: ts(day, 10),
        sequence,
        quantity,
        unit_price,
        fee: Decimal::ZERO,
        amount: None,
        currency: "USD".to_string(),
    }
}

fn cash(id: &str, trade_type: TradeType, day: u32, sequence: i64, amount: Decimal) -> Trade {
    Trade {
        amount: Some(amount),
        quantity: Decimal::ZERO,
        unit_price: Decimal::ZERO,
        ..trade(id, None, trade_type, day, sequence, Decimal::ZERO, Decimal::ZERO)
    }
}

#[test]
fn buy_accumulates_average_cost() {
    let trades = vec![
        cash("d1", TradeType::Deposit, 1, 1, dec!(10000)),
        trade("b1", Some("AAPL"), TradeType::Buy, 2, 2, dec!(10), dec!(100)),
        trade("b2", Some("AAPL"), TradeType::Buy, 3, 3, dec!(10), dec!(120)),
    ];
    let state = HoldingsState::from_trades(&trades);

    let position = &state.positions["AAPL"];
    assert_eq!(position.volume, dec!(20));
    assert_eq!(position.invested_local, dec!(2200));
    assert_eq!(position.average_cost(), dec!(110));
    assert_eq!(state.cash["USD"], dec!(10000) - dec!(2200));
}

#[test]
fn sell_realizes_against_average_cost() {
    let trades = vec![
        trade("b1", Some("AAPL"), TradeType::Buy, 1, 1, dec!(10), dec!(100)),
        trade("b2", Some("AAPL"), TradeType::Buy, 2, 2, dec!(10), dec!(120)),
        trade("s1", Some("AAPL"), TradeType::Sell, 3, 3, dec!(5), dec!(150)),
    ];
    let state = HoldingsState::from_trades(&trades);

    let position = &state.positions["AAPL"];
    assert_eq!(position.volume, dec!(15));
    // avg cost 110; realized = 5 * (150 - 110)
    assert_eq!(position.realized_local, dec!(200));
    assert_eq!(position.invested_local, dec!(2200) - dec!(5) * dec!(110));
}

#[test]
fn oversell_is_clamped_to_held_volume() {
    let trades = vec![
        trade("b1", Some("AAPL"), TradeType::Buy, 1, 1, dec!(5), dec!(100)),
        trade("s1", Some("AAPL"), TradeType::Sell, 2, 2, dec!(8), dec!(110)),
    ];
    let state = HoldingsState::from_trades(&trades);

    let position = &state.positions["AAPL"];
    assert_eq!(position.volume, Decimal::ZERO);
    assert_eq!(position.realized_local, dec!(5) * dec!(10));
}

#[test]
fn fees_flow_into_cost_basis_and_realized() {
    let mut buy = trade("b1", Some("AAPL"), TradeType::Buy, 1, 1, dec!(10), dec!(100));
    buy.fee = dec!(5);
    let mut sell = trade("s1", Some("AAPL"), TradeType::Sell, 2, 2, dec!(10), dec!(110));
    sell.fee = dec!(5);
    let state = HoldingsState::from_trades(&[buy, sell]);

    let position = &state.positions["AAPL"];
    // basis 1005, avg 100.5; realized = 10*(110-100.5) - 5
    assert_eq!(position.realized_local, dec!(90));
    assert_eq!(position.volume, Decimal::ZERO);
    assert_eq!(state.cash["USD"], dec!(-1005) + dec!(1095));
}

#[test]
fn fx_pair_buy_transfers_between_cash_balances() {
    let mut conversion = trade(
        "fx1",
        Some("EURUSD=X"),
        TradeType::Buy,
        2,
        2,
        dec!(1000),
        dec!(1.10),
    );
    conversion.currency = "USD".to_string();
    let trades = vec![cash("d1", TradeType::Deposit, 1, 1, dec!(2000)), conversion];
    let state = HoldingsState::from_trades(&trades);

    assert_eq!(state.cash["EUR"], dec!(1000));
    assert_eq!(state.cash["USD"], dec!(2000) - dec!(1100));
    // No equity position for the pair symbol
    assert!(state.positions.is_empty());
}

#[test]
fn dividends_and_withdrawals_adjust_cash() {
    let trades = vec![
        cash("d1", TradeType::Deposit, 1, 1, dec!(1000)),
        cash("v1", TradeType::Dividend, 2, 2, dec!(50)),
        cash("w1", TradeType::Withdrawal, 3, 3, dec!(200)),
        cash("f1", TradeType::Fee, 4, 4, dec!(10)),
    ];
    let state = HoldingsState::from_trades(&trades);
    assert_eq!(state.cash["USD"], dec!(840));
}

#[test]
fn replay_order_uses_sequence_tie_break() {
    // Same timestamp: the deposit was inserted before the buy, so the buy
    // must see the cash. Feed them reversed to prove sorting.
    let deposit = cash("d1", TradeType::Deposit, 1, 1, dec!(1000));
    let mut buy = trade("b1", Some("AAPL"), TradeType::Buy, 1, 2, dec!(5), dec!(100));
    buy.trade_date = deposit.trade_date;

    let forward = HoldingsState::from_trades(&[deposit.clone(), buy.clone()]);
    let reversed = HoldingsState::from_trades(&[buy, deposit]);
    assert_eq!(forward, reversed);
    assert_eq!(forward.cash["USD"], dec!(500));
}

mod determinism {
    use super::*;
    use proptest::prelude::*;

    fn arb_trade(index: usize) -> impl Strategy<Value = Trade> {
        (
            0u32..4,
            1u32..28,
            1u32..1000,
            1u32..500,
        )
            .prop_map(move |(kind, day, quantity, price)| {
                let quantity = Decimal::from(quantity) / dec!(10);
                let price = Decimal::from(price) / dec!(10);
                match kind {
                    0 => trade(
                        &format!("t{}", index),
                        Some("AAPL"),
                        TradeType::Buy,
                        day,
                        index as i64,
                        quantity,
                        price,
                    ),
                    1 => trade(
                        &format!("t{}", index),
                        Some("AAPL"),
                        TradeType::Sell,
                        day,
                        index as i64,
                        quantity,
                        price,
                    ),
                    2 => cash(
                        &format!("t{}", index),
                        TradeType::Deposit,
                        day,
                        index as i64,
                        quantity * price,
                    ),
                    _ => cash(
                        &format!("t{}", index),
                        TradeType::Withdrawal,
                        day,
                        index as i64,
                        quantity,
                    ),
                }
            })
    }

    proptest! {
        /// Replaying any ledger twice, even shuffled, yields identical state.
        #[test]
        fn replay_is_order_insensitive(
            mut trades in proptest::collection::vec((0usize..64).prop_flat_map(arb_trade), 1..32),
            seed in any::<u64>(),
        ) {
            // Unique insertion sequence so the replay order is well defined
            for (i, t) in trades.iter_mut().enumerate() {
                t.sequence = i as i64;
                t.id = format!("t{}", i);
            }
            let once = HoldingsState::from_trades(&trades);
            let mut shuffled = trades.clone();
            // Cheap deterministic shuffle keyed by the seed
            shuffled.sort_by_key(|t| {
                t.id.bytes().fold(seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
            });
            let twice = HoldingsState::from_trades(&shuffled);
            prop_assert_eq!(once, twice);
        }
    }
}
