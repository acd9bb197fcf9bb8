//! Core error types for the portfolio history cache.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use chrono::{NaiveDate, ParseError as ChronoParseError};
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the history cache subsystem.
///
/// Database-specific errors are wrapped in string form to keep this type
/// database-agnostic. `Clone` lets callers joined on one in-flight
/// recalculation share its outcome.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Valuation failed: {0}")]
    Valuation(#[from] ValuationError),

    #[error("Ledger read failed: {0}")]
    Ledger(String),

    #[error("Price oracle request failed: {0}")]
    PriceOracle(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// True when the error is fatal for a portfolio's recalculation and
    /// retrying with the same inputs cannot succeed (a held symbol with no
    /// price anywhere in history).
    pub fn is_fatal_valuation(&self) -> bool {
        matches!(self, Error::Valuation(ValuationError::NeverPriced { .. }))
    }
}

/// Database-agnostic error type for storage operations.
///
/// Uses `String` for all error details, allowing the storage layer to convert
/// storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug, Clone)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (e.g., duplicate portfolio+date).
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Errors that occur while replaying the ledger and valuing holdings.
#[derive(Error, Debug, Clone)]
pub enum ValuationError {
    /// A held symbol has no price anywhere in or before the requested range.
    /// Fatal for the portfolio's recalculation; carry-forward cannot help.
    #[error("No price has ever been recorded for held symbol '{symbol}' (portfolio {portfolio_id}, as of {date})")]
    NeverPriced {
        symbol: String,
        portfolio_id: String,
        date: NaiveDate,
    },

    #[error("FX rate {0}->{1} not available for date {2}")]
    MissingFxRate(String, String, NaiveDate),

    #[error("Unsupported trade type: {0}")]
    UnsupportedTradeType(String),

    #[error("Calculation failed: {0}")]
    Calculation(String),
}

/// Validation errors for boundary input and data parsing.
#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Failed to parse date: {0}")]
    DateParse(#[from] ChronoParseError),
}

// === From implementations for common error types ===

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<ChronoParseError> for Error {
    fn from(err: ChronoParseError) -> Self {
        Error::Validation(ValidationError::DateParse(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
