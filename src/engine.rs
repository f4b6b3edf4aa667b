//! Comparison run orchestration
//!
//! One call in, one report out: validates the schemas, streams both
//! sides into spill partitions (concurrently), joins them, and hands
//! the diff plus aggregates to the report assembler. No process-wide
//! state; everything a run needs travels in the request and context.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::aggregate::{compare_aggregates, AggregateComparison, ColumnAggregate, ColumnAggregator};
use crate::error::{CompareError, Result};
use crate::handle::DatasetHandle;
use crate::join::{encode_key, join_spilled, JoinConfig};
use crate::mapping::{ColumnMapping, MappingPolicy};
use crate::progress::{Phase, ProgressCounters, RunControl};
use crate::reader::{open_source, BatchProvider, BatchSource, MalformedPolicy};
use crate::report::{assemble_report, ComparisonReport};
use crate::spill::{PartitionWriterSet, SpillPartition, SpilledRow};
use crate::{DEFAULT_NUMERIC_TOLERANCE, DEFAULT_PARTITION_COUNT};

/// Engine tuning knobs with conservative defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub numeric_tolerance: f64,
    pub malformed_policy: MalformedPolicy,
    pub partition_count: usize,
    /// Maximum source rows indexed in memory per partition.
    pub memory_budget_rows: usize,
    /// Cap on recorded detail rows per diff category.
    pub max_detail_rows: usize,
    /// Distinct values tracked exactly before switching to estimation.
    pub distinct_budget: usize,
    pub timeout: Option<Duration>,
    pub mapping: MappingPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            numeric_tolerance: DEFAULT_NUMERIC_TOLERANCE,
            malformed_policy: MalformedPolicy::Skip,
            partition_count: DEFAULT_PARTITION_COUNT,
            memory_budget_rows: 1_000_000,
            max_detail_rows: 10_000,
            distinct_budget: 16_384,
            timeout: None,
            mapping: MappingPolicy::default(),
        }
    }
}

/// Everything the caller decides about one comparison run. Passed by
/// value into the engine; frozen once the run starts.
#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub source: DatasetHandle,
    pub target: DatasetHandle,
    /// Manual mapping overrides as (source column, target column).
    pub column_overrides: Vec<(String, String)>,
    /// Source-side names of the join key columns.
    pub join_keys: Vec<String>,
    /// Source-side names excluded from comparison.
    pub excluded_columns: Vec<String>,
    /// Confirm fuzzy mapping suggestions without interaction.
    pub accept_suggestions: bool,
    /// Acknowledge one-to-many pairings from duplicated key values.
    pub allow_duplicate_keys: bool,
    pub config: EngineConfig,
}

impl ComparisonRequest {
    pub fn new(source: DatasetHandle, target: DatasetHandle, join_keys: Vec<String>) -> Self {
        Self {
            source,
            target,
            column_overrides: Vec::new(),
            join_keys,
            excluded_columns: Vec::new(),
            accept_suggestions: false,
            allow_duplicate_keys: false,
            config: EngineConfig::default(),
        }
    }
}

/// Per-run collaborators: batch providers for non-file sources, shared
/// progress counters, and the cancellation/deadline control.
pub struct RunContext<'a> {
    pub provider: Option<&'a dyn BatchProvider>,
    pub counters: Arc<ProgressCounters>,
    pub control: RunControl,
}

impl Default for RunContext<'_> {
    fn default() -> Self {
        Self {
            provider: None,
            counters: ProgressCounters::new(),
            control: RunControl::unbounded(),
        }
    }
}

/// Run a comparison with default context (no providers, no observer).
pub fn run_comparison(request: &ComparisonRequest) -> Result<ComparisonReport> {
    run_comparison_with(request, &RunContext::default())
}

/// Run a comparison: validate, read, join, aggregate, assemble.
/// At most one attempt; on any failure all partial state is discarded.
pub fn run_comparison_with(
    request: &ComparisonRequest,
    ctx: &RunContext<'_>,
) -> Result<ComparisonReport> {
    let control = ctx.control.clone();
    let control = RunControl::new(control.cancel_token(), request.config.timeout);

    ctx.counters.set_phase(Phase::Validate);
    control.check(Phase::Validate)?;

    let source = open_source(&request.source, request.config.malformed_policy, ctx.provider)?;
    let target = open_source(&request.target, request.config.malformed_policy, ctx.provider)?;

    let plan = plan_comparison(request, source.as_ref(), target.as_ref())?;
    log::info!(
        "Comparing {} mapped columns on keys [{}]",
        plan.columns.len(),
        request.join_keys.join(", ")
    );

    // Read phase: both sides stream into spill partitions concurrently.
    ctx.counters.set_phase(Phase::Read);
    let spill_dir = tempfile::Builder::new()
        .prefix("tabcompare-spill-")
        .tempdir()?;

    let (source_out, target_out) = spill_both_sides(
        source,
        target,
        &plan,
        request,
        spill_dir.path(),
        ctx.counters.clone(),
        &control,
    )?;

    // Join phase.
    ctx.counters.set_phase(Phase::Join);
    let join_config = JoinConfig {
        tolerance: request.config.numeric_tolerance,
        memory_budget_rows: request.config.memory_budget_rows,
        max_detail_rows: request.config.max_detail_rows,
    };
    let mut diff = join_spilled(
        &source_out.partitions,
        &target_out.partitions,
        &plan.columns,
        &join_config,
        &control,
    )?;
    diff.source_row_count = source_out.rows;
    diff.target_row_count = target_out.rows;
    diff.source_malformed_skipped = source_out.malformed;
    diff.target_malformed_skipped = target_out.malformed;

    if !request.allow_duplicate_keys && diff.duplicate_keys() > 0 {
        return Err(CompareError::schema_mismatch(
            format!(
                "Join keys [{}] have {} duplicated values ({} source, {} target); re-run with duplicate keys acknowledged",
                request.join_keys.join(", "),
                diff.duplicate_keys(),
                diff.duplicate_source_keys,
                diff.duplicate_target_keys
            ),
            request.join_keys.clone(),
        ));
    }

    // Aggregate comparison phase.
    ctx.counters.set_phase(Phase::Aggregate);
    control.check(Phase::Aggregate)?;
    let column_checks = compare_sides(
        &plan,
        source_out.aggregates,
        target_out.aggregates,
        request.config.numeric_tolerance,
    );

    // Assembly.
    ctx.counters.set_phase(Phase::Assemble);
    let report = assemble_report(request, &plan.mapping, diff, column_checks);
    ctx.counters.set_phase(Phase::Done);

    Ok(report)
}

/// The frozen execution plan: which columns are compared (aligned on
/// both sides), which of them form the key, and where they live in each
/// side's schema.
#[derive(Debug)]
pub(crate) struct ComparisonPlan {
    pub mapping: ColumnMapping,
    /// Source-side names of the compared columns, in mapping order.
    pub columns: Vec<String>,
    pub source_indices: Vec<usize>,
    pub target_indices: Vec<usize>,
    /// Positions of the key columns within `columns`.
    pub key_positions: Vec<usize>,
}

fn plan_comparison(
    request: &ComparisonRequest,
    source: &dyn BatchSource,
    target: &dyn BatchSource,
) -> Result<ComparisonPlan> {
    let source_schema = source.schema().clone();
    let target_schema = target.schema().clone();

    let mut mapping = ColumnMapping::auto_map(&source_schema, &target_schema, &request.config.mapping);
    for (src, tgt) in &request.column_overrides {
        mapping.apply_override(&source_schema, &target_schema, src, tgt)?;
    }
    for column in &request.excluded_columns {
        mapping.exclude(column)?;
    }
    mapping.finalize(request.accept_suggestions)?;
    mapping.validate_join_keys(&request.join_keys)?;

    let pairs: Vec<(String, String)> = mapping
        .compared_pairs()
        .iter()
        .map(|e| (e.source.clone(), e.target.clone()))
        .collect();

    let mut columns = Vec::with_capacity(pairs.len());
    let mut source_indices = Vec::with_capacity(pairs.len());
    let mut target_indices = Vec::with_capacity(pairs.len());
    for (src, tgt) in &pairs {
        let src_idx = source_schema.index_of(src).ok_or_else(|| {
            CompareError::schema_mismatch(
                format!("Mapped column missing from source schema: {}", src),
                vec![src.clone()],
            )
        })?;
        let tgt_idx = target_schema.index_of(tgt).ok_or_else(|| {
            CompareError::schema_mismatch(
                format!("Mapped column missing from target schema: {}", tgt),
                vec![tgt.clone()],
            )
        })?;
        columns.push(src.clone());
        source_indices.push(src_idx);
        target_indices.push(tgt_idx);
    }

    let key_positions = request
        .join_keys
        .iter()
        .map(|key| {
            columns.iter().position(|c| c == key).ok_or_else(|| {
                CompareError::schema_mismatch(
                    format!("Join key is not among compared columns: {}", key),
                    vec![key.clone()],
                )
            })
        })
        .collect::<Result<Vec<usize>>>()?;

    Ok(ComparisonPlan {
        mapping,
        columns,
        source_indices,
        target_indices,
        key_positions,
    })
}

struct SideOutput {
    partitions: Vec<SpillPartition>,
    aggregates: Vec<ColumnAggregate>,
    rows: u64,
    malformed: u64,
}

fn spill_both_sides(
    source: Box<dyn BatchSource>,
    target: Box<dyn BatchSource>,
    plan: &ComparisonPlan,
    request: &ComparisonRequest,
    spill_dir: &Path,
    counters: Arc<ProgressCounters>,
    control: &RunControl,
) -> Result<(SideOutput, SideOutput)> {
    let source_task = SpillTask {
        columns: plan.columns.clone(),
        indices: plan.source_indices.clone(),
        key_positions: plan.key_positions.clone(),
        dir: spill_dir.to_path_buf(),
        label: "source",
        partition_count: request.config.partition_count,
        distinct_budget: request.config.distinct_budget,
        policy: request.config.malformed_policy,
        counters: counters.clone(),
        control: control.clone(),
    };
    let target_task = SpillTask {
        columns: plan.columns.clone(),
        indices: plan.target_indices.clone(),
        key_positions: plan.key_positions.clone(),
        dir: spill_dir.to_path_buf(),
        label: "target",
        partition_count: request.config.partition_count,
        distinct_budget: request.config.distinct_budget,
        policy: request.config.malformed_policy,
        counters,
        control: control.clone(),
    };

    let source_handle = thread::spawn(move || source_task.run(source));
    let target_handle = thread::spawn(move || target_task.run(target));

    let source_out = source_handle
        .join()
        .map_err(|_| CompareError::aborted(Phase::Read.name(), "source reader thread panicked"))??;
    let target_out = target_handle
        .join()
        .map_err(|_| CompareError::aborted(Phase::Read.name(), "target reader thread panicked"))??;

    Ok((source_out, target_out))
}

/// One side's read/spill work, moved into its reader thread.
struct SpillTask {
    columns: Vec<String>,
    indices: Vec<usize>,
    key_positions: Vec<usize>,
    dir: PathBuf,
    label: &'static str,
    partition_count: usize,
    distinct_budget: usize,
    policy: MalformedPolicy,
    counters: Arc<ProgressCounters>,
    control: RunControl,
}

impl SpillTask {
    fn run(self, mut input: Box<dyn BatchSource>) -> Result<SideOutput> {
        let mut writers =
            PartitionWriterSet::create(&self.dir, self.label, self.partition_count)?;
        let mut aggregators: Vec<ColumnAggregator> = self
            .columns
            .iter()
            .map(|c| ColumnAggregator::new(c.clone(), self.distinct_budget))
            .collect();

        let mut rows = 0u64;
        let mut malformed = 0u64;

        while let Some(batch) = input.next_batch()? {
            self.control.check(Phase::Read)?;

            for (offset, row) in batch.rows.iter().enumerate() {
                let row_index = batch.start_index + offset as u64;
                let values: Vec<crate::value::Value> = self
                    .indices
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(crate::value::Value::Null))
                    .collect();

                let key_values: Vec<&crate::value::Value> =
                    self.key_positions.iter().map(|&p| &values[p]).collect();
                if key_values.iter().any(|v| v.is_null()) {
                    match self.policy {
                        MalformedPolicy::Skip => {
                            malformed += 1;
                            log::warn!(
                                "{} row {} has a null join key value, skipping",
                                self.label,
                                row_index
                            );
                            continue;
                        }
                        MalformedPolicy::Abort => {
                            return Err(CompareError::malformed_record(
                                row_index,
                                format!("{} row has a null join key value", self.label),
                            ));
                        }
                    }
                }
                let key = encode_key(&key_values);

                for (aggregator, value) in aggregators.iter_mut().zip(values.iter()) {
                    aggregator.observe(value);
                }

                writers.write(&SpilledRow {
                    key,
                    row_index,
                    values,
                })?;
                rows += 1;
            }

            let read = batch.rows.len() as u64;
            if self.label == "source" {
                self.counters.add_source_rows(read);
            } else {
                self.counters.add_target_rows(read);
            }
        }

        Ok(SideOutput {
            partitions: writers.finish()?,
            aggregates: aggregators.into_iter().map(|a| a.finish()).collect(),
            rows,
            malformed,
        })
    }
}

fn compare_sides(
    plan: &ComparisonPlan,
    source: Vec<ColumnAggregate>,
    target: Vec<ColumnAggregate>,
    tolerance: f64,
) -> Vec<AggregateComparison> {
    let targets: Vec<String> = plan
        .mapping
        .compared_pairs()
        .iter()
        .map(|e| e.target.clone())
        .collect();

    source
        .into_iter()
        .zip(target.into_iter())
        .zip(plan.columns.iter().zip(targets.iter()))
        .map(|((src, tgt), (src_name, tgt_name))| {
            compare_aggregates(src_name, tgt_name, src, tgt, tolerance)
        })
        .collect()
}

// Integration-level behavior of the engine lives in tests/engine_tests.rs;
// the unit tests here cover planning edge cases only.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MemorySource;
    use crate::schema::{ColumnDescriptor, ColumnType, Schema};
    use crate::value::Value;

    fn int_schema(names: &[&str]) -> Schema {
        Schema::new(
            names
                .iter()
                .map(|n| ColumnDescriptor::new(*n, ColumnType::Integer))
                .collect(),
        )
    }

    #[test]
    fn test_plan_aligns_indices() {
        let source_schema = int_schema(&["a", "b", "id"]);
        let target_schema = int_schema(&["id", "a", "b"]);

        let source = MemorySource::new(source_schema, Vec::new(), 10);
        let target = MemorySource::new(target_schema, Vec::new(), 10);

        let request = ComparisonRequest::new(
            DatasetHandle::new(crate::handle::DatasetKind::Csv, "s.csv"),
            DatasetHandle::new(crate::handle::DatasetKind::Csv, "t.csv"),
            vec!["id".to_string()],
        );

        let plan = plan_comparison(&request, &source, &target).unwrap();
        assert_eq!(plan.columns, vec!["a", "b", "id"]);
        assert_eq!(plan.source_indices, vec![0, 1, 2]);
        assert_eq!(plan.target_indices, vec![1, 2, 0]);
        assert_eq!(plan.key_positions, vec![2]);
    }

    #[test]
    fn test_plan_rejects_unmapped_key() {
        let source_schema = int_schema(&["id"]);
        let target_schema = int_schema(&["other"]);

        let source = MemorySource::new(source_schema, vec![vec![Value::Int(1)]], 10);
        let target = MemorySource::new(target_schema, vec![vec![Value::Int(1)]], 10);

        let request = ComparisonRequest::new(
            DatasetHandle::new(crate::handle::DatasetKind::Csv, "s.csv"),
            DatasetHandle::new(crate::handle::DatasetKind::Csv, "t.csv"),
            vec!["id".to_string()],
        );

        let err = plan_comparison(&request, &source, &target).unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
    }
}
