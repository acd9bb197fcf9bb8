//! Valuation engine: trade replay and daily valuation of holdings.

pub mod engine;
pub mod replay;
pub mod valuation_model;

#[cfg(test)]
mod replay_tests;

pub use engine::{compute_daily_valuation, value_holdings};
pub use replay::{HoldingsState, PositionState};
pub use valuation_model::{
    CalculationStatus, CashBalance, HistoryMetadata, PortfolioHistoryRecord, PositionValuation,
    ValuationTotals,
};
