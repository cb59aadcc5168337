//! Turning query results into data mart files and reports.
//!
//! - `csv`: writes a result table as `{key}.csv`
//! - `validate`: consistency checks on aggregate results
//! - `exporter`: runs the catalog query by query
//! - `format`: console preview and summary rendering

pub mod csv;
pub mod exporter;
pub mod format;
pub mod validate;

pub use self::csv::write_table;
pub use exporter::{Exporter, QueryOutcome, QueryStatus, RunSummary};
pub use format::{SummaryFormat, format_as_table, format_preview, render_summary};
pub use validate::{ValidationIssue, check_table};
