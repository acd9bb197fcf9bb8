//! Read-only view over the append-only trade ledger.
//!
//! Trade mutation lives outside this crate; the history cache only ever
//! reads, through [`LedgerReaderTrait`].

pub mod ledger_model;
pub mod ledger_traits;

pub use ledger_model::{Trade, TradeType};
pub use ledger_traits::LedgerReaderTrait;
