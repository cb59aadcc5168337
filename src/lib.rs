//! Data mart exporter library.
//!
//! Runs a fixed catalog of read-only analytical queries against a star-schema
//! sales warehouse (PostgreSQL or SQLite) and writes each result to CSV.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;

pub use catalog::QueryCatalog;
pub use config::Config;
pub use error::{DbError, DbResult};
pub use export::{Exporter, RunSummary};
