//! Output formatting utilities

use crate::aggregate::AggregateVerdict;
use crate::error::Result;
use crate::report::ComparisonReport;
use crate::schema::Schema;

/// Pretty printer for tabcompare output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print a comparison report as a summary tree
    pub fn print_report(report: &ComparisonReport) {
        println!(
            "🔍 Comparison: {} → {}",
            report.source.location, report.target.location
        );
        println!("├─ Run: {}", report.run_id);
        println!("├─ Join keys: {}", report.join_keys.join(", "));

        let summary = &report.summary;
        println!(
            "├─ Rows: {} source / {} target ({} in common)",
            summary.source_row_count, summary.target_row_count, summary.common_count
        );

        if summary.all_rows_match {
            println!("├─ ✅ Rows: all matched");
        } else {
            println!("├─ ❌ Rows: differences found");
            if summary.mismatched_count > 0 {
                println!("│  ├─ Mismatched: {}", summary.mismatched_count);
            }
            if summary.source_only_count > 0 {
                println!("│  ├─ Only in source: {}", summary.source_only_count);
            }
            if summary.target_only_count > 0 {
                println!("│  └─ Only in target: {}", summary.target_only_count);
            }
        }

        if summary.source_malformed_skipped > 0 || summary.target_malformed_skipped > 0 {
            println!(
                "├─ ⚠️  Malformed rows skipped: {} source, {} target",
                summary.source_malformed_skipped, summary.target_malformed_skipped
            );
        }
        if summary.duplicate_source_keys > 0 || summary.duplicate_target_keys > 0 {
            println!(
                "├─ ⚠️  Duplicated key values: {} source, {} target",
                summary.duplicate_source_keys, summary.duplicate_target_keys
            );
        }

        let count_status = if report.count_check.passed { "PASS" } else { "FAIL" };
        println!(
            "├─ Count check: {} ({} vs {})",
            count_status, report.count_check.source_count, report.count_check.target_count
        );

        Self::print_column_checks(report);
        Self::print_sample_mismatches(report);
    }

    fn print_column_checks(report: &ComparisonReport) {
        if report.column_checks.is_empty() {
            return;
        }

        let failing: Vec<_> = report
            .column_checks
            .iter()
            .filter(|c| c.verdict == AggregateVerdict::Mismatch)
            .collect();

        if failing.is_empty() {
            println!("├─ ✅ Column checks: {} passed", report.column_checks.len());
            return;
        }

        println!(
            "├─ ❌ Column checks: {} of {} failed",
            failing.len(),
            report.column_checks.len()
        );
        for (i, check) in failing.iter().take(5).enumerate() {
            let prefix = if i == failing.len().min(5) - 1 { "└─" } else { "├─" };
            println!(
                "│  {} {}: non-null {} vs {}, distinct {} vs {}",
                prefix,
                check.source_column,
                check.source.non_null_count,
                check.target.non_null_count,
                check.source.distinct_count,
                check.target.distinct_count
            );
        }
        if failing.len() > 5 {
            println!("│     ... and {} more", failing.len() - 5);
        }
    }

    fn print_sample_mismatches(report: &ComparisonReport) {
        if report.mismatched_rows.is_empty() {
            println!("└─ No cell-level mismatches recorded");
            return;
        }

        println!("└─ Sample mismatches:");
        let shown = report.mismatched_rows.iter().take(5);
        let count = report.mismatched_rows.len().min(5);
        for (i, mismatch) in shown.enumerate() {
            let prefix = if i == count - 1 { "   └─" } else { "   ├─" };
            println!("{} key {}: {} columns differ", prefix, mismatch.key, mismatch.deltas.len());
            for delta in mismatch.deltas.iter().take(3) {
                println!(
                    "   │     {}: '{}' → '{}'",
                    delta.column, delta.source, delta.target
                );
            }
            if mismatch.deltas.len() > 3 {
                println!("   │     ... and {} more", mismatch.deltas.len() - 3);
            }
        }
        if report.mismatched_rows.len() > 5 {
            println!("      ... and {} more mismatched rows", report.mismatched_rows.len() - 5);
        }
    }

    /// Print a dataset schema (inspect command)
    pub fn print_schema(input: &str, schema: &Schema, row_count: Option<u64>) {
        println!("📄 {}", input);
        match row_count {
            Some(count) => println!("├─ Rows: {}", count),
            None => println!("├─ Rows: unknown"),
        }
        println!("└─ Columns: {}", schema.len());
        for (i, column) in schema.columns.iter().enumerate() {
            let prefix = if i == schema.len() - 1 { "   └─" } else { "   ├─" };
            println!("{} {} ({})", prefix, column.name, column.column_type);
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_formatter() {
        let data = serde_json::json!({"test": "value"});
        let result = JsonFormatter::format(&data).unwrap();
        assert!(result.contains("test"));
        assert!(result.contains("value"));
    }
}
