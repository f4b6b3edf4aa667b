//! Report assembly: pure transformation of diff and aggregate results
//! into a serializable payload
//!
//! External collaborators render this payload into Excel/HTML files;
//! nothing here touches the filesystem.

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateComparison, AggregateVerdict};
use crate::engine::ComparisonRequest;
use crate::handle::DatasetHandle;
use crate::join::{DiffResult, OrphanRow, RowMismatch};
use crate::mapping::ColumnMapping;

/// Headline counts of one comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub source_row_count: u64,
    pub target_row_count: u64,
    /// Keys present on both sides (matched + mismatched pairings).
    pub common_count: u64,
    pub matched_count: u64,
    pub mismatched_count: u64,
    pub source_only_count: u64,
    pub target_only_count: u64,
    pub duplicate_source_keys: u64,
    pub duplicate_target_keys: u64,
    pub source_malformed_skipped: u64,
    pub target_malformed_skipped: u64,
    pub all_rows_match: bool,
}

/// Source-vs-target total row count check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountCheck {
    pub source_count: u64,
    pub target_count: u64,
    pub passed: bool,
}

/// The full report payload handed to rendering collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub run_id: String,
    pub generated_at: String,
    pub source: DatasetHandle,
    pub target: DatasetHandle,
    pub join_keys: Vec<String>,
    pub numeric_tolerance: f64,
    pub summary: ComparisonSummary,
    pub mapping: ColumnMapping,
    pub count_check: CountCheck,
    /// Per-column source/target statistics with match verdicts.
    pub column_checks: Vec<AggregateComparison>,
    pub mismatched_rows: Vec<RowMismatch>,
    pub source_only_rows: Vec<OrphanRow>,
    pub target_only_rows: Vec<OrphanRow>,
}

impl ComparisonReport {
    pub fn has_differences(&self) -> bool {
        !self.summary.all_rows_match
            || !self.count_check.passed
            || self
                .column_checks
                .iter()
                .any(|c| c.verdict == AggregateVerdict::Mismatch)
    }
}

/// Build the report payload. Pure: consumes the diff, copies what it
/// needs from the request, performs no I/O.
pub fn assemble_report(
    request: &ComparisonRequest,
    mapping: &ColumnMapping,
    diff: DiffResult,
    column_checks: Vec<AggregateComparison>,
) -> ComparisonReport {
    let summary = ComparisonSummary {
        source_row_count: diff.source_row_count,
        target_row_count: diff.target_row_count,
        common_count: diff.matched_count + diff.mismatched_count,
        matched_count: diff.matched_count,
        mismatched_count: diff.mismatched_count,
        source_only_count: diff.source_only_count,
        target_only_count: diff.target_only_count,
        duplicate_source_keys: diff.duplicate_source_keys,
        duplicate_target_keys: diff.duplicate_target_keys,
        source_malformed_skipped: diff.source_malformed_skipped,
        target_malformed_skipped: diff.target_malformed_skipped,
        all_rows_match: !diff.has_differences(),
    };

    let count_check = CountCheck {
        source_count: diff.source_row_count,
        target_count: diff.target_row_count,
        passed: diff.source_row_count == diff.target_row_count,
    };

    ComparisonReport {
        run_id: uuid::Uuid::new_v4().to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        source: request.source.clone(),
        target: request.target.clone(),
        join_keys: request.join_keys.clone(),
        numeric_tolerance: request.config.numeric_tolerance,
        summary,
        mapping: mapping.clone(),
        count_check,
        column_checks,
        mismatched_rows: diff.mismatched_rows,
        source_only_rows: diff.source_only_rows,
        target_only_rows: diff.target_only_rows,
    }
}
