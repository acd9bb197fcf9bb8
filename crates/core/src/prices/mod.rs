//! Price oracle interface and carry-forward filling.

pub mod price_fill;
pub mod price_model;
pub mod price_traits;

pub use price_fill::fill_missing_prices;
pub use price_model::PricePoint;
pub use price_traits::PriceOracleTrait;
