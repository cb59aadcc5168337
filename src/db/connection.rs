//! Per-query database connections.
//!
//! The exporter never holds a connection across queries. Each query opens a
//! `DbConnection`, runs, and closes it again. Connections are opened read-only.
//! If a connection is dropped without `close` (panic, cancellation), sqlx
//! closes the underlying socket on drop.

use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DatabaseType};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Application name reported to PostgreSQL.
const APPLICATION_NAME: &str = "datamart-export";

/// Database-specific connection (avoids AnyConnection limitations).
#[derive(Debug)]
pub enum DbConnection {
    Postgres(PgConnection),
    SQLite(SqliteConnection),
}

impl DbConnection {
    /// Open a read-only connection.
    ///
    /// Fails with `DbError::Connection` when the host is unreachable, the
    /// credentials are rejected, the database does not exist, or the connect
    /// timeout elapses. Callers stop the current operation; there is no retry.
    pub async fn connect(config: &ConnectionConfig, connect_timeout: Duration) -> DbResult<Self> {
        debug!(
            db_type = %config.db_type,
            url = %config.masked_connection_string(),
            "Opening connection"
        );

        let connecting = async {
            match config.db_type {
                DatabaseType::PostgreSQL => {
                    let options = PgConnectOptions::from_str(&config.connection_string)
                        .map_err(DbError::connect_failed)?
                        .application_name(APPLICATION_NAME)
                        .options([("default_transaction_read_only", "on")]);
                    options
                        .connect()
                        .await
                        .map(DbConnection::Postgres)
                        .map_err(DbError::connect_failed)
                }
                DatabaseType::SQLite => {
                    let options = SqliteConnectOptions::from_str(&config.connection_string)
                        .map_err(DbError::connect_failed)?
                        .read_only(true)
                        .create_if_missing(false);
                    options
                        .connect()
                        .await
                        .map(DbConnection::SQLite)
                        .map_err(DbError::connect_failed)
                }
            }
        };

        match timeout(connect_timeout, connecting).await {
            Ok(result) => result,
            Err(_) => Err(DbError::connection(
                format!(
                    "Timed out after {}s connecting to {}",
                    connect_timeout.as_secs(),
                    config.masked_connection_string()
                ),
                "Check that the host is reachable and the port is correct",
            )),
        }
    }

    /// Close the connection gracefully.
    ///
    /// A failed close is logged and otherwise ignored; the connection is gone
    /// either way.
    pub async fn close(self) {
        let result = match self {
            DbConnection::Postgres(conn) => conn.close().await,
            DbConnection::SQLite(conn) => conn.close().await,
        };
        if let Err(e) = result {
            warn!(error = %e, "Error while closing connection");
        }
    }
}

/// Open a connection and close it again to verify the configuration.
pub async fn check_connection(
    config: &ConnectionConfig,
    connect_timeout: Duration,
) -> DbResult<()> {
    let conn = DbConnection::connect(config, connect_timeout).await?;
    conn.close().await;
    Ok(())
}
