//! Data models for the data mart exporter.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod table;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{MAX_QUERY_TIMEOUT_SECS, NamedQuery, is_valid_key};
pub use table::{CellValue, ResultTable};
