//! SQLite storage implementation for the Foliocache history store.
//!
//! This crate provides all database-related functionality using Diesel ORM
//! with SQLite. It implements [`foliocache_core::history::HistoryStoreTrait`]
//! and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The history store repository
//! - Database-specific model types (with Diesel derives)
//!
//! This crate is the only place in the workspace where Diesel dependencies
//! exist; `core` is database-agnostic and works with traits.

pub mod db;
pub mod errors;
pub mod schema;

// Repository implementation
pub mod history;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, run_migrations, spawn_writer, DbConnection, DbPool, WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from foliocache-core for convenience
pub use foliocache_core::errors::{DatabaseError, Error, Result};
