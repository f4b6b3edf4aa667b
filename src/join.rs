//! Full outer equi-join over spilled partitions, with per-cell diffing

use std::collections::VecDeque;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CompareError, Result};
use crate::progress::{Phase, RunControl};
use crate::spill::{PartitionReader, SpillPartition, SpilledRow};
use crate::value::Value;

/// Separator between key column values in the canonical key encoding.
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Canonical encoding of one row's join-key values.
pub fn encode_key(values: &[&Value]) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(KEY_SEPARATOR);
        }
        out.push_str(&v.key_repr());
    }
    out
}

/// Key rendering for report payloads.
pub fn display_key(key: &str) -> String {
    key.replace(KEY_SEPARATOR, "|")
}

/// Join tuning: comparison tolerance, in-memory budget per partition,
/// and the cap on recorded detail rows.
#[derive(Debug, Clone)]
pub struct JoinConfig {
    pub tolerance: f64,
    pub memory_budget_rows: usize,
    pub max_detail_rows: usize,
}

/// One differing cell of a mismatched row pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellDelta {
    pub column: String,
    pub source: String,
    pub target: String,
}

/// A key present on both sides with at least one differing column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowMismatch {
    pub key: String,
    pub source_row_index: u64,
    pub target_row_index: u64,
    pub deltas: Vec<CellDelta>,
}

/// A row whose key exists on one side only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanRow {
    pub key: String,
    pub row_index: u64,
    pub values: IndexMap<String, String>,
}

/// The complete diff of one comparison run. Detail rows are bounded by
/// `max_detail_rows` per category; counts are always exact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffResult {
    pub matched_count: u64,
    pub mismatched_count: u64,
    pub source_only_count: u64,
    pub target_only_count: u64,
    /// Keys occurring more than once on the source side.
    pub duplicate_source_keys: u64,
    /// Keys occurring more than once on the target side.
    pub duplicate_target_keys: u64,
    pub mismatched_rows: Vec<RowMismatch>,
    pub source_only_rows: Vec<OrphanRow>,
    pub target_only_rows: Vec<OrphanRow>,
    pub source_row_count: u64,
    pub target_row_count: u64,
    pub source_malformed_skipped: u64,
    pub target_malformed_skipped: u64,
}

impl DiffResult {
    pub fn has_differences(&self) -> bool {
        self.mismatched_count > 0 || self.source_only_count > 0 || self.target_only_count > 0
    }

    pub fn duplicate_keys(&self) -> u64 {
        self.duplicate_source_keys + self.duplicate_target_keys
    }
}

#[derive(Debug, Default)]
struct PartitionDiff {
    matched: u64,
    duplicate_source_keys: u64,
    duplicate_target_keys: u64,
    mismatched_count: u64,
    source_only_count: u64,
    target_only_count: u64,
    mismatches: Vec<RowMismatch>,
    source_only: Vec<OrphanRow>,
    target_only: Vec<OrphanRow>,
}

/// Join all spilled partitions and merge their diffs into a single,
/// deterministically ordered result. `columns` are the compared source
/// column names, aligned with the spilled value order.
pub fn join_spilled(
    source: &[SpillPartition],
    target: &[SpillPartition],
    columns: &[String],
    config: &JoinConfig,
    control: &RunControl,
) -> Result<DiffResult> {
    if source.len() != target.len() {
        return Err(CompareError::aborted(
            Phase::Join.name(),
            "source and target partition counts diverged",
        ));
    }

    let partition_diffs: Vec<PartitionDiff> = source
        .par_iter()
        .zip(target.par_iter())
        .map(|(src, tgt)| join_partition(src, tgt, columns, config, control))
        .collect::<Result<Vec<_>>>()?;

    let mut result = DiffResult::default();
    for diff in partition_diffs {
        result.matched_count += diff.matched;
        result.duplicate_source_keys += diff.duplicate_source_keys;
        result.duplicate_target_keys += diff.duplicate_target_keys;
        result.mismatched_count += diff.mismatched_count;
        result.source_only_count += diff.source_only_count;
        result.target_only_count += diff.target_only_count;
        result.mismatched_rows.extend(diff.mismatches);
        result.source_only_rows.extend(diff.source_only);
        result.target_only_rows.extend(diff.target_only);
    }

    // Merge order must not depend on partition scheduling.
    result
        .mismatched_rows
        .sort_by(|a, b| (&a.key, a.source_row_index).cmp(&(&b.key, b.source_row_index)));
    result
        .source_only_rows
        .sort_by(|a, b| (&a.key, a.row_index).cmp(&(&b.key, b.row_index)));
    result
        .target_only_rows
        .sort_by(|a, b| (&a.key, a.row_index).cmp(&(&b.key, b.row_index)));

    result.mismatched_rows.truncate(config.max_detail_rows);
    result.source_only_rows.truncate(config.max_detail_rows);
    result.target_only_rows.truncate(config.max_detail_rows);

    Ok(result)
}

/// Join one partition pair: index the source side, stream the target
/// side against it, then drain unmatched source rows.
fn join_partition(
    source: &SpillPartition,
    target: &SpillPartition,
    columns: &[String],
    config: &JoinConfig,
    control: &RunControl,
) -> Result<PartitionDiff> {
    control.check(Phase::Join)?;

    if source.rows as usize > config.memory_budget_rows {
        return Err(CompareError::aborted(
            Phase::Join.name(),
            format!(
                "partition holds {} source rows, exceeding the in-memory budget of {}; raise the budget or the partition count",
                source.rows, config.memory_budget_rows
            ),
        ));
    }

    // Encounter order is preserved both across keys and within a key.
    let mut index: IndexMap<String, VecDeque<SpilledRow>> = IndexMap::new();
    for row in PartitionReader::open(&source.path)? {
        let row = row?;
        index.entry(row.key.clone()).or_default().push_back(row);
    }

    let mut diff = PartitionDiff {
        duplicate_source_keys: index.values().filter(|queue| queue.len() > 1).count() as u64,
        ..PartitionDiff::default()
    };

    let mut target_key_counts: IndexMap<String, u64> = IndexMap::new();
    let mut processed = 0u64;

    for row in PartitionReader::open(&target.path)? {
        let tgt_row = row?;
        processed += 1;
        if processed % 4096 == 0 {
            control.check(Phase::Join)?;
        }

        *target_key_counts.entry(tgt_row.key.clone()).or_insert(0) += 1;
        if target_key_counts.len() > config.memory_budget_rows {
            return Err(CompareError::aborted(
                Phase::Join.name(),
                format!(
                    "partition tracks more than {} distinct target keys, exceeding the in-memory budget; raise the budget or the partition count",
                    config.memory_budget_rows
                ),
            ));
        }

        let src_row = index.get_mut(&tgt_row.key).and_then(|queue| queue.pop_front());
        match src_row {
            Some(src_row) => {
                let deltas = diff_cells(&src_row, &tgt_row, columns, config.tolerance);
                if deltas.is_empty() {
                    diff.matched += 1;
                } else {
                    diff.mismatched_count += 1;
                    if diff.mismatches.len() < config.max_detail_rows {
                        diff.mismatches.push(RowMismatch {
                            key: display_key(&tgt_row.key),
                            source_row_index: src_row.row_index,
                            target_row_index: tgt_row.row_index,
                            deltas,
                        });
                    }
                }
            }
            None => {
                diff.target_only_count += 1;
                if diff.target_only.len() < config.max_detail_rows {
                    diff.target_only.push(orphan(&tgt_row, columns));
                }
            }
        }
    }

    diff.duplicate_target_keys = target_key_counts.values().filter(|&&n| n > 1).count() as u64;

    // Leftover source rows (unseen keys and surplus duplicates).
    for (_, queue) in index {
        for src_row in queue {
            diff.source_only_count += 1;
            if diff.source_only.len() < config.max_detail_rows {
                diff.source_only.push(orphan(&src_row, columns));
            }
        }
    }

    Ok(diff)
}

/// Compare the compared-column values of a paired row, cell by cell.
fn diff_cells(
    source: &SpilledRow,
    target: &SpilledRow,
    columns: &[String],
    tolerance: f64,
) -> Vec<CellDelta> {
    let mut deltas = Vec::new();
    for (i, column) in columns.iter().enumerate() {
        let src = source.values.get(i).unwrap_or(&Value::Null);
        let tgt = target.values.get(i).unwrap_or(&Value::Null);
        if !src.equals_with_tolerance(tgt, tolerance) {
            deltas.push(CellDelta {
                column: column.clone(),
                source: src.display(),
                target: tgt.display(),
            });
        }
    }
    deltas
}

fn orphan(row: &SpilledRow, columns: &[String]) -> OrphanRow {
    let values = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let value = row.values.get(i).unwrap_or(&Value::Null);
            (column.clone(), value.display())
        })
        .collect();

    OrphanRow {
        key: display_key(&row.key),
        row_index: row.row_index,
        values,
    }
}
