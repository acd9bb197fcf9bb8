//! History store trait and the cache service orchestrating reads and
//! recalculations.

pub mod history_model;
pub mod history_service;
pub mod history_traits;


pub use history_model::{HistoryConfig, HistoryResponse, UpdateOutcome};
pub use history_service::{HistoryService, HistoryServiceTrait};
pub use history_traits::HistoryStoreTrait;
