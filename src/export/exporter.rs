//! Sequential export of every named query.
//!
//! Each query is validated, executed on its own connection, checked, written
//! to `{key}.csv` and dropped before the next one starts. A failing query is
//! recorded in the summary and the run moves on.

use crate::catalog::{QueryCatalog, validate_readonly};
use crate::db::{DbConnection, QueryExecutor, check_connection};
use crate::error::{DbError, DbResult, FailureCategory};
use crate::export::csv::write_table;
use crate::export::validate::{ValidationIssue, check_table};
use crate::models::{ConnectionConfig, NamedQuery, ResultTable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub const DEFAULT_PREVIEW_ROWS: usize = 3;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Format a byte count for log output.
///
/// ```
/// use datamart_export::export::exporter::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(2048), "2 kB");
/// ```
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::WINDOWS)
}

/// Size of a written file, 0 (with a warning) when it cannot be read.
fn file_size(path: &Path) -> u64 {
    match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read size of exported file");
            0
        }
    }
}

/// How a single query ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueryStatus {
    /// Rows were written to `path`.
    Exported {
        rows: usize,
        path: PathBuf,
        bytes: u64,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        issues: Vec<ValidationIssue>,
    },
    /// The query returned no rows; nothing was written.
    Skipped,
    Failed {
        category: FailureCategory,
        error: String,
    },
}

/// Result of one named query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub key: String,
    pub label: String,
    pub file_name: String,
    pub elapsed_ms: u64,
    pub status: QueryStatus,
    /// Leading rows kept for the console preview.
    #[serde(skip)]
    pub preview: Option<ResultTable>,
}

impl QueryOutcome {
    pub fn is_exported(&self) -> bool {
        matches!(self.status, QueryStatus::Exported { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, QueryStatus::Failed { .. })
    }
}

/// Everything a run produced, in query order.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub elapsed_secs: f64,
    pub outcomes: Vec<QueryOutcome>,
}

impl RunSummary {
    pub fn exported_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_exported()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, QueryStatus::Skipped))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn outcome(&self, key: &str) -> Option<&QueryOutcome> {
        self.outcomes.iter().find(|o| o.key == key)
    }

    /// Process exit code: 0 when nothing failed, 2 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.failed_count() == 0 { 0 } else { 2 }
    }
}

/// Runs a query catalog against one database and writes the results.
#[derive(Debug, Clone)]
pub struct Exporter {
    config: ConnectionConfig,
    output_dir: PathBuf,
    executor: QueryExecutor,
    connect_timeout: Duration,
    preview_rows: usize,
    strict: bool,
}

impl Exporter {
    pub fn new(config: ConnectionConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
            executor: QueryExecutor::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            strict: false,
        }
    }

    pub fn with_executor(mut self, executor: QueryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Rows kept per exported table for the preview; 0 keeps none.
    pub fn with_preview_rows(mut self, preview_rows: usize) -> Self {
        self.preview_rows = preview_rows;
        self
    }

    /// Refuse to export tables that fail validation.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run every query in catalog order.
    ///
    /// Returns `Err` only when the run cannot start: the output directory
    /// cannot be created or the preflight connection fails. Per-query
    /// failures are reported in the summary.
    pub async fn run_all(&self, catalog: &QueryCatalog) -> DbResult<RunSummary> {
        let started_at = Utc::now();
        let start = Instant::now();

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            DbError::export(
                &self.output_dir,
                format!("cannot create output directory: {}", e),
            )
        })?;

        info!(
            db_type = %self.config.db_type,
            url = %self.config.masked_connection_string(),
            "Checking database connection"
        );
        if let Err(e) = check_connection(&self.config, self.connect_timeout).await {
            error!(error = %e, suggestion = ?e.suggestion(), "Database connection failed");
            return Err(e);
        }
        info!(
            queries = catalog.len(),
            output_dir = %self.output_dir.display(),
            "Starting data mart export"
        );

        let mut outcomes = Vec::with_capacity(catalog.len());
        for query in catalog.queries() {
            outcomes.push(self.run_one(query).await);
        }

        let summary = RunSummary {
            started_at,
            output_dir: self.output_dir.clone(),
            elapsed_secs: start.elapsed().as_secs_f64(),
            outcomes,
        };
        info!(
            exported = summary.exported_count(),
            skipped = summary.skipped_count(),
            failed = summary.failed_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Export finished"
        );
        Ok(summary)
    }

    /// Validate, execute, check and write a single query.
    pub async fn run_one(&self, query: &NamedQuery) -> QueryOutcome {
        let start = Instant::now();
        let label = query.label();
        let path = self.output_dir.join(query.file_name());

        info!(query = %query.key, "Executing: {}", label);

        let (status, preview) = match self.export(query, &path).await {
            Ok(Some((table, issues))) => {
                let bytes = file_size(&path);
                info!(
                    query = %query.key,
                    rows = table.row_count(),
                    path = %path.display(),
                    size = %format_size(bytes),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Exported {} rows",
                    table.row_count()
                );
                let preview = (self.preview_rows > 0).then(|| table.head(self.preview_rows));
                let status = QueryStatus::Exported {
                    rows: table.row_count(),
                    path: path.clone(),
                    bytes,
                    issues,
                };
                (status, preview)
            }
            Ok(None) => {
                warn!(
                    query = %query.key,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "No data for {}",
                    label
                );
                (QueryStatus::Skipped, None)
            }
            Err(e) => {
                error!(
                    query = %query.key,
                    category = %e.category(),
                    error = %e,
                    suggestion = ?e.suggestion(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Error in {}",
                    label
                );
                let status = QueryStatus::Failed {
                    category: e.category(),
                    error: e.to_string(),
                };
                (status, None)
            }
        };

        QueryOutcome {
            key: query.key.clone(),
            label,
            file_name: query.file_name(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            status,
            preview,
        }
    }

    /// `Ok(None)` when the query returned no rows.
    async fn export(
        &self,
        query: &NamedQuery,
        path: &Path,
    ) -> DbResult<Option<(ResultTable, Vec<ValidationIssue>)>> {
        let sql = query.sql_for(self.config.db_type);
        validate_readonly(sql, self.config.db_type)?;

        let table = self.fetch(sql).await?;
        if table.is_empty() {
            return Ok(None);
        }

        let issues = check_table(&query.key, &table);
        for issue in &issues {
            warn!(query = %query.key, issue = %issue, "Validation issue");
        }
        if self.strict {
            if let Some(first) = issues.first() {
                return Err(DbError::validation(format!(
                    "{} issue(s), first: {}",
                    issues.len(),
                    first
                )));
            }
        }

        write_table(Some(&table), path)?;
        Ok(Some((table, issues)))
    }

    /// Run `sql` on a fresh connection, closing it before returning.
    async fn fetch(&self, sql: &str) -> DbResult<ResultTable> {
        let mut conn = DbConnection::connect(&self.config, self.connect_timeout).await?;
        let result = self.executor.run_query(&mut conn, sql).await;
        conn.close().await;
        result
    }
}
