//! Console rendering for previews and the run summary.

use crate::export::exporter::{QueryStatus, RunSummary};
use crate::models::{CellValue, ResultTable};
use clap::ValueEnum;
use unicode_width::UnicodeWidthStr;

const RULE_WIDTH: usize = 60;

/// Output format for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SummaryFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// The run summary as pretty-printed JSON
    Json,
}

/// Render a table as an ASCII grid (like the MySQL CLI).
pub fn format_as_table(table: &ResultTable) -> String {
    if table.columns().is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = table.columns().iter().map(|c| c.width()).collect();
    for row in table.rows() {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.to_string().width());
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    output.push_str(&separator);
    let header: String = table
        .columns()
        .iter()
        .zip(&widths)
        .map(|(name, w)| format!("| {} ", pad_center(name, *w)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in table.rows() {
        let row_str: String = row
            .iter()
            .zip(&widths)
            .map(|(value, w)| format!("| {} ", pad_cell(value, *w)))
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&separator);
    output
}

/// Pad a cell to `width` display columns; numbers align right.
fn pad_cell(value: &CellValue, width: usize) -> String {
    let text = value.to_string();
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if value.is_numeric() {
        format!("{}{}", fill, text)
    } else {
        format!("{}{}", text, fill)
    }
}

fn pad_center(text: &str, width: usize) -> String {
    let total = width.saturating_sub(text.width());
    let left = total / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(total - left))
}

/// Preview section for every exported data mart that kept rows.
pub fn format_preview(summary: &RunSummary) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut output = format!("{rule}\nDATA MART PREVIEW\n{rule}\n");
    for outcome in &summary.outcomes {
        let Some(preview) = outcome.preview.as_ref().filter(|p| !p.is_empty()) else {
            continue;
        };
        output.push_str(&format!(
            "\n{}\n{}\n",
            outcome.file_name,
            "-".repeat(RULE_WIDTH)
        ));
        output.push_str(&format_as_table(preview));
    }
    output
}

/// Plain-text run summary.
pub fn format_summary(summary: &RunSummary) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut output = format!("{rule}\nEXPORT SUMMARY\n{rule}\n");

    for outcome in &summary.outcomes {
        let line = match &outcome.status {
            QueryStatus::Exported { rows, issues, .. } if issues.is_empty() => {
                format!("  exported  {:<28} {} rows", outcome.file_name, rows)
            }
            QueryStatus::Exported { rows, issues, .. } => format!(
                "  exported  {:<28} {} rows, {} validation issue(s)",
                outcome.file_name,
                rows,
                issues.len()
            ),
            QueryStatus::Skipped => format!("  skipped   {:<28} no data", outcome.file_name),
            QueryStatus::Failed { category, error } => format!(
                "  failed    {:<28} {} error: {}",
                outcome.file_name, category, error
            ),
        };
        output.push_str(&line);
        output.push('\n');
    }

    output.push_str(&format!(
        "\nTotal Data Marts Created: {} of {} ({} skipped, {} failed)\n",
        summary.exported_count(),
        summary.outcomes.len(),
        summary.skipped_count(),
        summary.failed_count()
    ));
    output.push_str(&format!(
        "Output Directory: {}\n",
        summary.output_dir.display()
    ));
    output.push_str(&format!(
        "Total Time: {:.2} seconds\n",
        summary.elapsed_secs
    ));
    output.push_str(&rule);
    output.push('\n');
    output
}

/// Render the summary in the requested format.
pub fn render_summary(summary: &RunSummary, format: SummaryFormat) -> String {
    match format {
        SummaryFormat::Text => format_summary(summary),
        SummaryFormat::Json => serde_json::to_string_pretty(summary)
            .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize summary: {}\"}}", e)),
    }
}
