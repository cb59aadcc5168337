//! Integration tests for read-only warehouse access.
//!
//! Tests verify that:
//! - Connections opened by the exporter cannot modify the warehouse
//! - Query definitions are screened before they reach the database
//! - Column types come back as the expected cell values

use datamart_export::catalog::{QueryCatalog, check_catalog, validate_readonly};
use datamart_export::db::{DbConnection, QueryExecutor};
use datamart_export::error::DbError;
use datamart_export::models::{CellValue, ConnectionConfig, DatabaseType, NamedQuery};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;
use std::time::Duration;
use tempfile::TempDir;

async fn setup_db() -> (TempDir, ConnectionConfig) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("warehouse.db").display());

    let mut conn = SqliteConnectOptions::from_str(&url)
        .unwrap()
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    sqlx::raw_sql(
        "CREATE TABLE fact_sales (Sale_Id INTEGER PRIMARY KEY, Product_ID TEXT, \
             Sales REAL, Quantity INTEGER, Discount REAL, Profit REAL, Receipt BLOB);
         INSERT INTO fact_sales VALUES (1, 'P1', 261.96, 2, 0.0, 41.9136, X'6F6B');
         INSERT INTO fact_sales VALUES (2, 'P2', 731.94, 3, 0.2, -383.031, X'FF00');",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();

    (dir, ConnectionConfig::new(url, None).unwrap())
}

#[tokio::test]
async fn test_connection_rejects_writes() {
    let (_dir, config) = setup_db().await;
    let mut conn = DbConnection::connect(&config, Duration::from_secs(5))
        .await
        .unwrap();

    let err = QueryExecutor::new()
        .run_query(&mut conn, "DELETE FROM fact_sales")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Database { .. }), "{:?}", err);

    let table = QueryExecutor::new()
        .run_query(&mut conn, "SELECT COUNT(*) AS n FROM fact_sales")
        .await
        .unwrap();
    assert_eq!(table.value(0, "n"), Some(&CellValue::Int(2)));
    conn.close().await;
}

#[tokio::test]
async fn test_values_decoded_by_storage_class() {
    let (_dir, config) = setup_db().await;
    let mut conn = DbConnection::connect(&config, Duration::from_secs(5))
        .await
        .unwrap();

    let table = QueryExecutor::with_timeout(30)
        .run_query(
            &mut conn,
            "SELECT Product_ID, Quantity, Sales, Receipt, NULL AS Missing \
             FROM fact_sales ORDER BY Sale_Id",
        )
        .await
        .unwrap();
    conn.close().await;

    assert_eq!(
        table.columns(),
        ["Product_ID", "Quantity", "Sales", "Receipt", "Missing"]
    );
    assert_eq!(table.value(0, "product_id"), Some(&CellValue::Text("P1".into())));
    assert_eq!(table.value(0, "Quantity"), Some(&CellValue::Int(2)));
    assert_eq!(table.value(0, "Sales"), Some(&CellValue::Float(261.96)));
    assert_eq!(table.value(0, "Receipt").unwrap().to_string(), "ok");
    assert_eq!(table.value(1, "Receipt").unwrap().to_string(), "/wA=");
    assert!(table.value(0, "Missing").unwrap().is_null());
}

#[tokio::test]
async fn test_empty_result_has_no_rows() {
    let (_dir, config) = setup_db().await;
    let mut conn = DbConnection::connect(&config, Duration::from_secs(5))
        .await
        .unwrap();

    let table = QueryExecutor::new()
        .run_query(&mut conn, "SELECT * FROM fact_sales WHERE Profit > 1000")
        .await
        .unwrap();
    conn.close().await;
    assert!(table.is_empty());
}

#[test]
fn test_builtin_catalog_passes_screening() {
    let catalog = QueryCatalog::builtin();
    assert_eq!(catalog.len(), 8);
    assert!(check_catalog(&catalog, DatabaseType::PostgreSQL).is_empty());
    assert!(check_catalog(&catalog, DatabaseType::SQLite).is_empty());
}

#[test]
fn test_screening_rejects_writes_and_batches() {
    for sql in [
        "INSERT INTO products VALUES ('P9', 'x', 'y', 'z')",
        "UPDATE fact_sales SET Profit = 0",
        "DROP TABLE orders",
        "SELECT 1; SELECT 2",
    ] {
        let err = validate_readonly(sql, DatabaseType::PostgreSQL).unwrap_err();
        assert!(matches!(err, DbError::Permission { .. }), "{}: {:?}", sql, err);
    }
}

#[test]
fn test_custom_catalog() {
    let catalog = QueryCatalog::from_queries(vec![
        NamedQuery::new("units", "SELECT SUM(Quantity) AS Units FROM fact_sales"),
        NamedQuery::new("purge", "TRUNCATE fact_sales"),
    ])
    .unwrap();
    let failures = check_catalog(&catalog, DatabaseType::PostgreSQL);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "purge");
    assert_eq!(catalog.get("units").unwrap().file_name(), "units.csv");
}
