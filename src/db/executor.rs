//! Query execution engine.
//!
//! This module runs one analytical statement on an open connection and
//! materializes the complete result set into a [`ResultTable`].
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `postgres`: PostgreSQL-specific fetch
//! - `sqlite`: SQLite-specific fetch
//!
//! Statements are sent without bind parameters, so PostgreSQL uses the simple
//! query protocol and returns text-format values.

use crate::db::connection::DbConnection;
use crate::db::types::RowToValues;
use crate::error::{DbError, DbResult};
use crate::models::{MAX_QUERY_TIMEOUT_SECS, ResultTable};
use futures_util::{Stream, TryStreamExt};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Query executor that handles statement execution.
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    query_timeout: Option<Duration>,
}

impl QueryExecutor {
    /// Create a new query executor without a timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a query executor that aborts statements running longer than `timeout_secs`.
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            query_timeout: Some(Duration::from_secs(
                timeout_secs.clamp(1, MAX_QUERY_TIMEOUT_SECS),
            )),
        }
    }

    /// The effective per-query timeout, if any.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    /// Execute a statement and return all of its rows.
    pub async fn run_query(&self, conn: &mut DbConnection, sql: &str) -> DbResult<ResultTable> {
        let start = Instant::now();

        debug!(
            sql = %sql,
            timeout_secs = ?self.query_timeout.map(|t| t.as_secs()),
            "Executing query"
        );

        let fetch = async {
            match &mut *conn {
                DbConnection::Postgres(c) => postgres::fetch_table(c, sql).await,
                DbConnection::SQLite(c) => sqlite::fetch_table(c, sql).await,
            }
        };

        let table = match self.query_timeout {
            Some(limit) => match timeout(limit, fetch).await {
                Ok(result) => result?,
                Err(_) => return Err(DbError::timeout("query execution", limit.as_secs())),
            },
            None => fetch.await?,
        };

        debug!(
            rows = table.row_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query finished"
        );

        Ok(table)
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

/// Drain a row stream into a table, taking column names from the first row.
async fn collect_table<R, S>(mut rows: S) -> DbResult<ResultTable>
where
    R: RowToValues,
    S: Stream<Item = Result<R, sqlx::Error>> + Unpin,
{
    let mut table: Option<ResultTable> = None;
    while let Some(row) = rows.try_next().await.map_err(DbError::from)? {
        table
            .get_or_insert_with(|| ResultTable::new(row.column_names()))
            .push_row(row.to_values());
    }
    Ok(table.unwrap_or_default())
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::Executor;
    use sqlx::postgres::PgConnection;

    pub async fn fetch_table(conn: &mut PgConnection, sql: &str) -> DbResult<ResultTable> {
        collect_table(conn.fetch(sql)).await
    }
}

mod sqlite {
    use super::*;
    use sqlx::Executor;
    use sqlx::sqlite::SqliteConnection;

    pub async fn fetch_table(conn: &mut SqliteConnection, sql: &str) -> DbResult<ResultTable> {
        collect_table(conn.fetch(sql)).await
    }
}
