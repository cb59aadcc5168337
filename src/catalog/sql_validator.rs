//! SQL statement validation for read-only enforcement.
//!
//! Query definitions are data loaded from disk, so each one is checked before
//! it reaches the warehouse: it must parse in the target dialect, contain
//! exactly one statement, and that statement must be a query.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) for accurate SQL parsing,
//! so write operations cannot slip through formatting tricks or comments.

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

/// Error messages for rejected statements.
mod error_messages {
    pub const NOT_A_QUERY: &str =
        "Only SELECT queries are allowed in data mart definitions.";
    pub const MULTIPLE_STATEMENTS: &str =
        "A data mart definition must contain exactly one statement.";
    pub const PARSE_ERROR: &str = "Failed to parse SQL statement.";
}

/// Get the appropriate SQL dialect for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Validate SQL for read-only execution.
///
/// Returns `Ok(())` for a single `SELECT` (including `WITH` and set
/// operations), `Err(DbError::InvalidInput)` when the text does not parse,
/// and `Err(DbError::Permission)` for anything that is not a query.
///
/// # Examples
///
/// ```
/// use datamart_export::catalog::sql_validator::validate_readonly;
/// use datamart_export::models::DatabaseType;
///
/// assert!(validate_readonly("SELECT * FROM fact_sales", DatabaseType::PostgreSQL).is_ok());
/// assert!(validate_readonly("DELETE FROM fact_sales", DatabaseType::PostgreSQL).is_err());
/// ```
pub fn validate_readonly(sql: &str, db_type: DatabaseType) -> DbResult<()> {
    let dialect = get_dialect(db_type);

    let statements = Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| {
        DbError::invalid_input(format!("{} Error: {}", error_messages::PARSE_ERROR, e))
    })?;

    match statements.as_slice() {
        [] => Err(DbError::invalid_input("Empty SQL statement")),
        [stmt] => validate_statement(stmt),
        _ => Err(DbError::permission(
            "MULTIPLE STATEMENTS",
            error_messages::MULTIPLE_STATEMENTS,
        )),
    }
}

/// Validate a single parsed statement.
fn validate_statement(stmt: &Statement) -> DbResult<()> {
    match stmt {
        Statement::Query(_) => Ok(()),
        other => Err(DbError::permission(
            statement_keyword(other),
            error_messages::NOT_A_QUERY,
        )),
    }
}

/// Leading keyword of a statement, for error messages.
fn statement_keyword(stmt: &Statement) -> String {
    stmt.to_string()
        .split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_uppercase()
}
