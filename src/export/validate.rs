//! Consistency checks on exported result tables.
//!
//! The warehouse computes every ratio; these checks recompute the ones that
//! can be derived from other columns of the same row and flag disagreements.
//! Checks are driven by column names (case-insensitive), so they apply to any
//! query that exposes the relevant columns.

use crate::models::ResultTable;
use serde::Serialize;

/// Allowed absolute difference between a reported and a recomputed percentage.
const PCT_TOLERANCE: f64 = 0.011;

/// Row limit of the top-N queries.
pub const TOP_N_LIMIT: usize = 10;

/// Discount bucket labels in ascending order.
pub const DISCOUNT_BUCKETS: [&str; 5] = ["0% (No Discount)", "01-20%", "21-40%", "41-60%", "61-100%"];

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `round(total_profit / total_sales * 100, 2)`, or `None` when sales are zero.
pub fn profit_margin_pct(total_profit: f64, total_sales: f64) -> Option<f64> {
    if total_sales == 0.0 {
        return None;
    }
    Some(round2(total_profit / total_sales * 100.0))
}

/// `round(loss_count * 100 / transaction_count, 2)`, or `None` for no transactions.
pub fn loss_rate_pct(loss_count: f64, transaction_count: f64) -> Option<f64> {
    if transaction_count == 0.0 {
        return None;
    }
    Some(round2(loss_count * 100.0 / transaction_count))
}

/// Bucket label for a discount fraction. Upper bounds are inclusive.
pub fn discount_bucket(discount: f64) -> &'static str {
    if discount == 0.0 {
        DISCOUNT_BUCKETS[0]
    } else if discount <= 0.2 {
        DISCOUNT_BUCKETS[1]
    } else if discount <= 0.4 {
        DISCOUNT_BUCKETS[2]
    } else if discount <= 0.6 {
        DISCOUNT_BUCKETS[3]
    } else {
        DISCOUNT_BUCKETS[4]
    }
}

/// One inconsistency found in a result table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// Zero-based data row, `None` for table-level issues.
    pub row: Option<usize>,
    pub column: String,
    pub message: String,
}

impl ValidationIssue {
    fn at(row: usize, column: &str, message: impl Into<String>) -> Self {
        Self {
            row: Some(row),
            column: column.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {} {}: {}", row + 1, self.column, self.message),
            None => write!(f, "{}: {}", self.column, self.message),
        }
    }
}

/// Run every applicable check against a query's result.
pub fn check_table(key: &str, table: &ResultTable) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if matches!(key, "top_products" | "top_losses") && table.row_count() > TOP_N_LIMIT {
        issues.push(ValidationIssue {
            row: None,
            column: "*".to_string(),
            message: format!(
                "expected at most {} rows, got {}",
                TOP_N_LIMIT,
                table.row_count()
            ),
        });
    }

    for row in 0..table.row_count() {
        check_ratio(table, row, "Profit_Margin_Pct", "Total_Profit", "Total_Sales", &mut issues);
        check_ratio(table, row, "Loss_Margin_Pct", "Total_Loss", "Total_Sales", &mut issues);
        check_loss_rate(table, row, &mut issues);
        check_discount_range(table, row, &mut issues);
        check_transaction_split(table, row, &mut issues);
        check_negative_loss(key, table, row, &mut issues);
    }

    issues
}

fn number(table: &ResultTable, row: usize, column: &str) -> Option<f64> {
    table.value(row, column).and_then(|v| v.as_f64())
}

fn check_ratio(
    table: &ResultTable,
    row: usize,
    pct_column: &str,
    numerator: &str,
    denominator: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let (Some(reported), Some(num), Some(den)) = (
        number(table, row, pct_column),
        number(table, row, numerator),
        number(table, row, denominator),
    ) else {
        return;
    };
    if let Some(expected) = profit_margin_pct(num, den) {
        if (reported - expected).abs() > PCT_TOLERANCE {
            issues.push(ValidationIssue::at(
                row,
                pct_column,
                format!("reported {} but {} / {} gives {:.2}", reported, numerator, denominator, expected),
            ));
        }
    }
}

fn check_loss_rate(table: &ResultTable, row: usize, issues: &mut Vec<ValidationIssue>) {
    let Some(reported) = number(table, row, "Loss_Rate_Pct") else {
        return;
    };
    if !(0.0..=100.0).contains(&reported) {
        issues.push(ValidationIssue::at(
            row,
            "Loss_Rate_Pct",
            format!("{} is outside 0-100", reported),
        ));
        return;
    }

    let losses = number(table, row, "Loss_Transactions").or_else(|| number(table, row, "Loss_Count"));
    let (Some(losses), Some(total)) = (losses, number(table, row, "Transaction_Count")) else {
        return;
    };
    if let Some(expected) = loss_rate_pct(losses, total) {
        if (reported - expected).abs() > PCT_TOLERANCE {
            issues.push(ValidationIssue::at(
                row,
                "Loss_Rate_Pct",
                format!("reported {} but loss count gives {:.2}", reported, expected),
            ));
        }
    }
}

fn check_discount_range(table: &ResultTable, row: usize, issues: &mut Vec<ValidationIssue>) {
    let Some(value) = table.value(row, "Discount_Range") else {
        return;
    };
    let label = value.to_string();
    if !DISCOUNT_BUCKETS.contains(&label.as_str()) {
        issues.push(ValidationIssue::at(
            row,
            "Discount_Range",
            format!("unknown bucket '{}'", label),
        ));
    }
}

fn check_transaction_split(table: &ResultTable, row: usize, issues: &mut Vec<ValidationIssue>) {
    let (Some(total), Some(profitable), Some(losses), Some(even)) = (
        number(table, row, "Total_Transactions"),
        number(table, row, "Profitable_Transactions"),
        number(table, row, "Loss_Transactions"),
        number(table, row, "Break_Even_Transactions"),
    ) else {
        return;
    };
    if profitable + losses + even != total {
        issues.push(ValidationIssue::at(
            row,
            "Total_Transactions",
            format!(
                "{} profitable + {} loss + {} break-even != {}",
                profitable, losses, even, total
            ),
        ));
    }
}

fn check_negative_loss(
    key: &str,
    table: &ResultTable,
    row: usize,
    issues: &mut Vec<ValidationIssue>,
) {
    // Total_Loss in profit_loss_overview sums negative rows only and may be NULL.
    if key != "top_losses" {
        return;
    }
    if let Some(loss) = number(table, row, "Total_Loss") {
        if loss >= 0.0 {
            issues.push(ValidationIssue::at(
                row,
                "Total_Loss",
                format!("{} is not a loss", loss),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn table(columns: &[&str], rows: Vec<Vec<CellValue>>) -> ResultTable {
        let mut t = ResultTable::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            t.push_row(row);
        }
        t
    }

    #[test]
    fn test_profit_margin_pct() {
        assert_eq!(profit_margin_pct(150.0, 1000.0), Some(15.00));
        assert_eq!(profit_margin_pct(-20.0, 300.0), Some(-6.67));
        assert_eq!(profit_margin_pct(10.0, 0.0), None);
    }

    #[test]
    fn test_loss_rate_pct() {
        assert_eq!(loss_rate_pct(1.0, 3.0), Some(33.33));
        assert_eq!(loss_rate_pct(0.0, 5.0), Some(0.0));
        assert_eq!(loss_rate_pct(1.0, 0.0), None);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(15.004), 15.0);
        assert_eq!(round2(2.675_1), 2.68);
        assert_eq!(round2(-6.666), -6.67);
    }

    #[test]
    fn test_discount_bucket_boundaries() {
        assert_eq!(discount_bucket(0.0), "0% (No Discount)");
        assert_eq!(discount_bucket(0.2), "01-20%");
        assert_eq!(discount_bucket(0.4), "21-40%");
        assert_eq!(discount_bucket(0.6), "41-60%");
        assert_eq!(discount_bucket(0.75), "61-100%");
        assert_eq!(discount_bucket(0.01), "01-20%");
        assert_eq!(discount_bucket(1.0), "61-100%");
    }

    #[test]
    fn test_consistent_margin_passes() {
        let t = table(
            &["Segment", "Total_Sales", "Total_Profit", "Profit_Margin_Pct"],
            vec![vec![
                CellValue::Text("Consumer".into()),
                CellValue::Decimal("1000.00".into()),
                CellValue::Decimal("150.00".into()),
                CellValue::Decimal("15.00".into()),
            ]],
        );
        assert!(check_table("customer_segments", &t).is_empty());
    }

    #[test]
    fn test_margin_mismatch_flagged() {
        let t = table(
            &["total_sales", "total_profit", "profit_margin_pct"],
            vec![vec![
                CellValue::Float(1000.0),
                CellValue::Float(150.0),
                CellValue::Float(16.0),
            ]],
        );
        let issues = check_table("customer_segments", &t);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, Some(0));
        assert_eq!(issues[0].column, "Profit_Margin_Pct");
    }

    #[test]
    fn test_null_margin_skipped() {
        let t = table(
            &["Total_Sales", "Total_Profit", "Profit_Margin_Pct"],
            vec![vec![CellValue::Float(0.0), CellValue::Float(0.0), CellValue::Null]],
        );
        assert!(check_table("sales_trend", &t).is_empty());
    }

    #[test]
    fn test_loss_rate_checks() {
        let t = table(
            &["Transaction_Count", "Loss_Count", "Loss_Rate_Pct"],
            vec![
                vec![CellValue::Int(3), CellValue::Int(1), CellValue::Float(33.33)],
                vec![CellValue::Int(3), CellValue::Int(1), CellValue::Float(50.0)],
                vec![CellValue::Int(3), CellValue::Int(1), CellValue::Float(120.0)],
            ],
        );
        let issues = check_table("discount_analysis", &t);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].row, Some(1));
        assert!(issues[1].message.contains("outside"));
    }

    #[test]
    fn test_unknown_discount_bucket_flagged() {
        let t = table(
            &["Discount_Range"],
            vec![
                vec![CellValue::Text("01-20%".into())],
                vec![CellValue::Text("20-30%".into())],
            ],
        );
        let issues = check_table("discount_analysis", &t);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, Some(1));
    }

    #[test]
    fn test_transaction_split() {
        let t = table(
            &[
                "Total_Transactions",
                "Profitable_Transactions",
                "Loss_Transactions",
                "Break_Even_Transactions",
            ],
            vec![
                vec![CellValue::Int(10), CellValue::Int(6), CellValue::Int(3), CellValue::Int(1)],
                vec![CellValue::Int(10), CellValue::Int(6), CellValue::Int(3), CellValue::Int(0)],
            ],
        );
        let issues = check_table("profit_loss_overview", &t);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, Some(1));
    }

    #[test]
    fn test_top_losses_must_be_negative() {
        let t = table(
            &["Total_Loss"],
            vec![vec![CellValue::Float(-5.0)], vec![CellValue::Float(3.0)]],
        );
        let issues = check_table("top_losses", &t);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].column, "Total_Loss");
        // Same column elsewhere is not checked
        assert!(check_table("profit_loss_overview", &t).is_empty());
    }

    #[test]
    fn test_top_n_limit() {
        let rows = (0..11).map(|i| vec![CellValue::Int(i)]).collect();
        let t = table(&["Transaction_Count"], rows);
        let issues = check_table("top_products", &t);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, None);
        assert!(check_table("sales_by_region", &t).is_empty());
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::at(2, "Loss_Rate_Pct", "bad");
        assert_eq!(issue.to_string(), "row 3 Loss_Rate_Pct: bad");
    }
}
