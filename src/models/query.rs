//! Query-related data models.
//!
//! This module defines named query definitions and their timeout bounds.

use crate::models::DatabaseType;
use serde::Serialize;

/// Maximum allowed per-query timeout in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u64 = 3600;

/// A named analytical query.
///
/// The key doubles as the output filename stem (`{key}.csv`) and as the source
/// of the human-readable label used in progress output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedQuery {
    pub key: String,
    /// SQL in the default (PostgreSQL) dialect.
    pub sql: String,
    /// Replacement SQL for SQLite when the default uses PostgreSQL-only functions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_sql: Option<String>,
}

impl NamedQuery {
    /// Create a query that uses the same SQL on every database.
    pub fn new(key: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            sql: sql.into(),
            sqlite_sql: None,
        }
    }

    /// Attach a SQLite-dialect variant.
    pub fn with_sqlite_sql(mut self, sql: impl Into<String>) -> Self {
        self.sqlite_sql = Some(sql.into());
        self
    }

    /// SQL text to run against the given database type.
    pub fn sql_for(&self, db_type: DatabaseType) -> &str {
        match db_type {
            DatabaseType::SQLite => self.sqlite_sql.as_deref().unwrap_or(&self.sql),
            DatabaseType::PostgreSQL => &self.sql,
        }
    }

    /// Output file name for this query.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.key)
    }

    /// Human-readable label: `top_products` becomes `Top Products`.
    pub fn label(&self) -> String {
        self.key
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Check that a query key is usable as a filename stem.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
