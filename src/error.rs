//! Error types for the data mart exporter.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Connection and database errors carry an actionable suggestion that is shown next
//! to the failing query in the run summary.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// SQLSTATE codes that indicate the warehouse schema no longer matches a query.
const SCHEMA_DRIFT_STATES: &[&str] = &["42P01", "42703"];

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42601" for a syntax error
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Permission denied: {operation} - {reason}")]
    Permission { operation: String, reason: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Export failed for {}: {message}", path.display())]
    Export { path: PathBuf, message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Which stage of a query's lifecycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCategory {
    Connection,
    Query,
    Export,
    Validation,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Query => write!(f, "query"),
            Self::Export => write!(f, "export"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create a permission error.
    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an export error for the given output path.
    pub fn export(path: &Path, message: impl Into<String>) -> Self {
        Self::Export {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map an error raised while opening a connection.
    ///
    /// Everything that goes wrong before a connection exists is a connection
    /// failure, including server-side rejections such as bad credentials.
    pub fn connect_failed(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let suggestion = match code.as_deref() {
                    Some("28P01") | Some("28000") => "Check the user name and password",
                    Some("3D000") => "Verify that the target database exists",
                    _ => "Check the connection settings and server logs",
                };
                DbError::connection(db_err.message(), suggestion)
            }
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check that the host is reachable and the port is correct",
            ),
            other => match DbError::from(other) {
                err @ DbError::Connection { .. } => err,
                err => DbError::connection(
                    err.to_string(),
                    "Check the connection settings and server logs",
                ),
            },
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// The lifecycle stage this error belongs to.
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Connection { .. } => FailureCategory::Connection,
            Self::Export { .. } => FailureCategory::Export,
            Self::Validation { .. } => FailureCategory::Validation,
            Self::Database { .. }
            | Self::Schema { .. }
            | Self::Permission { .. }
            | Self::Timeout { .. }
            | Self::InvalidInput { .. }
            | Self::Internal { .. } => FailureCategory::Query,
        }
    }

    /// Check if this error is a connection failure.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Extract the object name from an SQLite "no such table: x" / "no such column: x" message.
fn sqlite_missing_object(message: &str) -> Option<&str> {
    ["no such table:", "no such column:"]
        .iter()
        .find_map(|prefix| message.strip_prefix(prefix))
        .map(str::trim)
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let message = db_err.message().to_string();
                if code
                    .as_deref()
                    .is_some_and(|c| SCHEMA_DRIFT_STATES.contains(&c))
                {
                    let object = message
                        .split('"')
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    return DbError::schema(message, object);
                }
                if let Some(object) = sqlite_missing_object(&message) {
                    let object = object.to_string();
                    return DbError::schema(message, object);
                }
                DbError::database(message, code, "Check the SQL syntax and referenced objects")
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => DbError::schema(
                format!("Type not found: {}", type_name),
                type_name.to_string(),
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for exporter operations.
pub type DbResult<T> = Result<T, DbError>;
