//! CSV output for result tables.

use crate::error::{DbError, DbResult};
use crate::models::ResultTable;
use csv::{QuoteStyle, WriterBuilder};
use std::path::Path;

/// Write a result table to `path` as comma-separated values.
///
/// The first record is the header of column names, followed by one record per
/// row. An existing file is overwritten. Returns `Ok(false)` without touching
/// the file system when the table is absent or has no rows.
pub fn write_table(table: Option<&ResultTable>, path: &Path) -> DbResult<bool> {
    let Some(table) = table.filter(|t| !t.is_empty()) else {
        return Ok(false);
    };

    let export_err = |e: csv::Error| DbError::export(path, e.to_string());

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_path(path)
        .map_err(export_err)?;

    writer.write_record(table.columns()).map_err(export_err)?;

    let mut record = Vec::with_capacity(table.columns().len());
    for row in table.rows() {
        record.clear();
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record).map_err(export_err)?;
    }

    writer
        .flush()
        .map_err(|e| DbError::export(path, e.to_string()))?;
    Ok(true)
}
