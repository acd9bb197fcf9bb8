//! Foliocache Core - Portfolio history cache domain logic.
//!
//! This crate contains the valuation engine, the history cache service,
//! and the daily maintenance job. It is database-agnostic and defines
//! traits that are implemented by the `storage-sqlite` crate and by the
//! host's ledger and price-oracle collaborators.

pub mod calendar;
pub mod constants;
pub mod errors;
pub mod fx;
pub mod history;
pub mod ledger;
pub mod maintenance;
pub mod prices;
pub mod utils;
pub mod valuation;

// Re-export the service-facing types
pub use history::*;
pub use maintenance::*;
pub use valuation::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
