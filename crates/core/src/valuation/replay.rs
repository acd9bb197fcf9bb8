//! Chronological trade replay.
//!
//! Accumulates per-symbol volume, average-cost basis, and realized results,
//! plus multi-currency cash balances. Market values and base-currency
//! conversions are not computed here; that is the engine's job.

use log::warn;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::fx;
use crate::ledger::{Trade, TradeType};

/// Running state of one position during replay.
///
/// `invested_local` and `realized_local` are kept in the position's local
/// currency; conversion to base happens at valuation time under the crate's
/// fixed rate convention.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionState {
    pub symbol: String,
    pub currency: String,
    pub volume: Decimal,
    /// Cost basis of the open volume (average-cost method).
    pub invested_local: Decimal,
    /// Cumulative realized result from sells, net of fees.
    pub realized_local: Decimal,
}

impl PositionState {
    fn new(symbol: &str, currency: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            currency: currency.to_string(),
            volume: Decimal::ZERO,
            invested_local: Decimal::ZERO,
            realized_local: Decimal::ZERO,
        }
    }

    /// Average cost per unit of the open volume.
    pub fn average_cost(&self) -> Decimal {
        if self.volume.is_zero() {
            Decimal::ZERO
        } else {
            self.invested_local / self.volume
        }
    }
}

/// Accumulated holdings after replaying a prefix of the ledger.
///
/// BTreeMaps keep iteration order deterministic, which the engine relies on
/// for reproducible totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoldingsState {
    pub positions: BTreeMap<String, PositionState>,
    pub cash: BTreeMap<String, Decimal>,
}

impl HoldingsState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays `trades` in deterministic order (trade time, then insertion
    /// sequence) onto an empty state.
    pub fn from_trades(trades: &[Trade]) -> Self {
        let mut state = Self::new();
        state.apply_trades(trades);
        state
    }

    /// Applies a batch of trades in deterministic order.
    pub fn apply_trades(&mut self, trades: &[Trade]) {
        let mut ordered: Vec<&Trade> = trades.iter().collect();
        ordered.sort_by_key(|t| t.ordering_key());
        for trade in ordered {
            self.apply_trade(trade);
        }
    }

    /// Applies one trade. Malformed entries are logged and skipped so a
    /// single bad row never aborts a whole replay.
    pub fn apply_trade(&mut self, trade: &Trade) {
        // FX conversions ride on buy/sell entries with a pair-marked symbol.
        if let Some(pair) = trade
            .symbol
            .as_deref()
            .and_then(fx::parse_fx_symbol)
        {
            self.apply_fx_conversion(trade, pair);
            return;
        }

        match trade.trade_type {
            TradeType::Buy => self.apply_buy(trade),
            TradeType::Sell => self.apply_sell(trade),
            TradeType::Deposit => self.add_cash(&trade.currency, trade.cash_amount()),
            TradeType::Withdrawal => {
                self.add_cash(&trade.currency, -(trade.cash_amount() + trade.fee))
            }
            TradeType::Dividend | TradeType::Interest => {
                self.add_cash(&trade.currency, trade.cash_amount() - trade.fee)
            }
            TradeType::Fee => self.add_cash(&trade.currency, -trade.cash_amount()),
            TradeType::Unknown => {
                warn!("Unknown trade type for trade {}. Skipped.", trade.id);
            }
        }
    }

    /// Symbols currently held with non-zero volume.
    pub fn held_symbols(&self) -> impl Iterator<Item = &str> {
        self.positions
            .values()
            .filter(|p| !p.volume.is_zero())
            .map(|p| p.symbol.as_str())
    }

    fn apply_buy(&mut self, trade: &Trade) {
        let Some(symbol) = trade.symbol.as_deref() else {
            warn!("Buy trade {} has no symbol. Skipped.", trade.id);
            return;
        };
        let cost = trade.quantity * trade.unit_price;
        let position = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| PositionState::new(symbol, &trade.currency));
        position.volume += trade.quantity;
        position.invested_local += cost + trade.fee;
        self.add_cash(&trade.currency, -(cost + trade.fee));
    }

    fn apply_sell(&mut self, trade: &Trade) {
        let Some(symbol) = trade.symbol.as_deref() else {
            warn!("Sell trade {} has no symbol. Skipped.", trade.id);
            return;
        };
        let Some(position) = self.positions.get_mut(symbol) else {
            warn!(
                "Sell trade {} for '{}' with no prior position. Skipped.",
                trade.id, symbol
            );
            return;
        };

        let mut sold = trade.quantity;
        if sold > position.volume {
            warn!(
                "Sell trade {} for '{}' exceeds held volume ({} > {}). Clamped.",
                trade.id, symbol, sold, position.volume
            );
            sold = position.volume;
        }

        let average_cost = position.average_cost();
        position.realized_local += sold * (trade.unit_price - average_cost) - trade.fee;
        position.invested_local -= sold * average_cost;
        position.volume -= sold;
        self.add_cash(&trade.currency, sold * trade.unit_price - trade.fee);
    }

    /// A pair-marked trade moves value between two cash balances:
    /// buying `FROM_TO=X` receives `quantity` of FROM and pays
    /// `quantity * unit_price` of TO; selling is the reverse.
    fn apply_fx_conversion(&mut self, trade: &Trade, (from, to): (String, String)) {
        let counter_value = trade.quantity * trade.unit_price;
        match trade.trade_type {
            TradeType::Buy => {
                self.add_cash(&from, trade.quantity);
                self.add_cash(&to, -(counter_value + trade.fee));
            }
            TradeType::Sell => {
                self.add_cash(&from, -trade.quantity);
                self.add_cash(&to, counter_value - trade.fee);
            }
            other => {
                warn!(
                    "FX-pair trade {} has non-conversion type {}. Skipped.",
                    trade.id,
                    other.as_str()
                );
            }
        }
    }

    fn add_cash(&mut self, currency: &str, delta: Decimal) {
        let code = fx::normalize_currency_code(currency).to_string();
        *self.cash.entry(code).or_insert(Decimal::ZERO) += delta;
    }
}

trait CashAmount {
    fn cash_amount(&self) -> Decimal;
}

impl CashAmount for Trade {
    /// Cash trades carry their value in `amount`; fall back to
    /// quantity x price for ledgers that encode them as unit trades.
    fn cash_amount(&self) -> Decimal {
        self.amount.unwrap_or(self.quantity * self.unit_price)
    }
}
