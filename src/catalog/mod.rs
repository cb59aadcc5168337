//! Named query definitions.
//!
//! The built-in data marts are versioned `.sql` files under `queries/`,
//! embedded at compile time. A directory of `{key}.sql` / `{key}.sqlite.sql`
//! files can replace individual definitions at runtime without rebuilding.

pub mod sql_validator;

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, NamedQuery, is_valid_key};
use std::path::Path;
use tracing::{debug, info};

pub use sql_validator::validate_readonly;

/// Built-in definitions in presentation order: (key, default SQL, SQLite variant).
const BUILTIN_QUERIES: &[(&str, &str, Option<&str>)] = &[
    (
        "sales_trend",
        include_str!("../../queries/sales_trend.sql"),
        Some(include_str!("../../queries/sales_trend.sqlite.sql")),
    ),
    (
        "top_products",
        include_str!("../../queries/top_products.sql"),
        None,
    ),
    (
        "sales_by_region",
        include_str!("../../queries/sales_by_region.sql"),
        None,
    ),
    (
        "category_performance",
        include_str!("../../queries/category_performance.sql"),
        None,
    ),
    (
        "customer_segments",
        include_str!("../../queries/customer_segments.sql"),
        None,
    ),
    (
        "discount_analysis",
        include_str!("../../queries/discount_analysis.sql"),
        None,
    ),
    (
        "top_losses",
        include_str!("../../queries/top_losses.sql"),
        None,
    ),
    (
        "profit_loss_overview",
        include_str!("../../queries/profit_loss_overview.sql"),
        None,
    ),
];

/// Ordered collection of named queries.
#[derive(Debug, Clone, Default)]
pub struct QueryCatalog {
    queries: Vec<NamedQuery>,
}

impl QueryCatalog {
    /// The eight built-in data mart queries.
    pub fn builtin() -> Self {
        let queries = BUILTIN_QUERIES
            .iter()
            .map(|(key, sql, sqlite_sql)| {
                let query = NamedQuery::new(*key, *sql);
                match sqlite_sql {
                    Some(variant) => query.with_sqlite_sql(*variant),
                    None => query,
                }
            })
            .collect();
        Self { queries }
    }

    /// Build a catalog from explicit queries, keeping their order.
    ///
    /// Keys must be unique and usable as file name stems.
    pub fn from_queries(queries: Vec<NamedQuery>) -> DbResult<Self> {
        let mut seen = std::collections::HashSet::new();
        for query in &queries {
            if !is_valid_key(&query.key) {
                return Err(DbError::invalid_input(format!(
                    "Invalid query key '{}': use lowercase letters, digits and underscores",
                    query.key
                )));
            }
            if !seen.insert(query.key.as_str()) {
                return Err(DbError::invalid_input(format!(
                    "Duplicate query key '{}'",
                    query.key
                )));
            }
        }
        Ok(Self { queries })
    }

    /// Replace definitions with files from `dir`.
    ///
    /// For each known key, `{key}.sql` replaces the default SQL and
    /// `{key}.sqlite.sql` the SQLite variant. Other files are ignored.
    pub fn load_overrides(mut self, dir: &Path) -> DbResult<Self> {
        if !dir.is_dir() {
            return Err(DbError::invalid_input(format!(
                "Query directory does not exist: {}",
                dir.display()
            )));
        }

        for query in &mut self.queries {
            let default_path = dir.join(format!("{}.sql", query.key));
            if let Some(sql) = read_definition(&default_path)? {
                info!(query = %query.key, path = %default_path.display(), "Using query override");
                query.sql = sql;
            }

            let sqlite_path = dir.join(format!("{}.sqlite.sql", query.key));
            if let Some(sql) = read_definition(&sqlite_path)? {
                info!(query = %query.key, path = %sqlite_path.display(), "Using SQLite query override");
                query.sqlite_sql = Some(sql);
            }
        }

        Ok(self)
    }

    pub fn queries(&self) -> &[NamedQuery] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&NamedQuery> {
        self.queries.iter().find(|q| q.key == key)
    }
}

/// Read one definition file, `None` when it does not exist.
fn read_definition(path: &Path) -> DbResult<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    debug!(path = %path.display(), "Reading query definition");
    std::fs::read_to_string(path).map(Some).map_err(|e| {
        DbError::invalid_input(format!(
            "Failed to read query definition {}: {}",
            path.display(),
            e
        ))
    })
}

/// Validate every definition for the given database type.
///
/// Returns the keys that failed together with their errors; an empty vector
/// means every definition is a single read-only query.
pub fn check_catalog(catalog: &QueryCatalog, db_type: DatabaseType) -> Vec<(String, DbError)> {
    catalog
        .queries()
        .iter()
        .filter_map(|q| {
            validate_readonly(q.sql_for(db_type), db_type)
                .err()
                .map(|e| (q.key.clone(), e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let catalog = QueryCatalog::builtin();
        let keys: Vec<&str> = catalog.queries().iter().map(|q| q.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "sales_trend",
                "top_products",
                "sales_by_region",
                "category_performance",
                "customer_segments",
                "discount_analysis",
                "top_losses",
                "profit_loss_overview",
            ]
        );
    }

    #[test]
    fn test_builtin_queries_are_readonly() {
        let catalog = QueryCatalog::builtin();
        for db_type in [DatabaseType::PostgreSQL, DatabaseType::SQLite] {
            let failures = check_catalog(&catalog, db_type);
            assert!(failures.is_empty(), "{:?}: {:?}", db_type, failures);
        }
    }

    #[test]
    fn test_only_sales_trend_has_sqlite_variant() {
        let catalog = QueryCatalog::builtin();
        let trend = catalog.get("sales_trend").unwrap();
        assert!(trend.sql_for(DatabaseType::PostgreSQL).contains("DATE_TRUNC"));
        let sqlite_sql = trend.sql_for(DatabaseType::SQLite);
        assert!(!sqlite_sql.contains("DATE_TRUNC"));
        assert!(sqlite_sql.contains("strftime('%Y-%m-01', o.Order_Date)"));
        assert!(
            catalog
                .queries()
                .iter()
                .filter(|q| q.key != "sales_trend")
                .all(|q| q.sqlite_sql.is_none())
        );
    }

    #[test]
    fn test_from_queries_rejects_bad_keys() {
        let err = QueryCatalog::from_queries(vec![NamedQuery::new("../x", "SELECT 1")])
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));

        let err = QueryCatalog::from_queries(vec![
            NamedQuery::new("a", "SELECT 1"),
            NamedQuery::new("a", "SELECT 2"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_load_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("top_losses.sql"), "SELECT 1 AS x").unwrap();
        std::fs::write(dir.path().join("sales_trend.sqlite.sql"), "SELECT 2 AS y").unwrap();
        std::fs::write(dir.path().join("unrelated.sql"), "SELECT 3").unwrap();

        let catalog = QueryCatalog::builtin().load_overrides(dir.path()).unwrap();
        assert_eq!(catalog.len(), 8);
        assert_eq!(catalog.get("top_losses").unwrap().sql, "SELECT 1 AS x");
        assert_eq!(
            catalog
                .get("sales_trend")
                .unwrap()
                .sql_for(DatabaseType::SQLite),
            "SELECT 2 AS y"
        );
        assert!(
            catalog
                .get("sales_trend")
                .unwrap()
                .sql
                .contains("DATE_TRUNC")
        );
        assert!(catalog.get("unrelated").is_none());
    }

    #[test]
    fn test_load_overrides_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = QueryCatalog::builtin()
            .load_overrides(&dir.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_check_catalog_reports_writes() {
        let catalog = QueryCatalog::from_queries(vec![
            NamedQuery::new("ok", "SELECT 1"),
            NamedQuery::new("bad", "UPDATE fact_sales SET Profit = 0"),
        ])
        .unwrap();
        let failures = check_catalog(&catalog, DatabaseType::PostgreSQL);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "bad");
    }
}
