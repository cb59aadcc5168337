//! Database access layer.
//!
//! This module provides database access functionality:
//! - Read-only per-query connections
//! - Query execution
//! - Type mappings

pub mod connection;
pub mod executor;
pub mod types;

pub use connection::{DbConnection, check_connection};
pub use executor::QueryExecutor;
