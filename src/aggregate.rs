//! Single-pass per-column statistics with bounded-memory distinct counts

use std::collections::{BinaryHeap, HashSet};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// How many distinct display values to retain as a sample per column.
const DISTINCT_SAMPLE_LIMIT: usize = 16;

/// Bounded-memory distinct counter: exact up to a budget, then a
/// k-minimum-values sketch (k = budget) over 64-bit value hashes.
#[derive(Debug)]
pub struct DistinctCounter {
    budget: usize,
    exact: Option<HashSet<u64>>,
    // KMV state: the k smallest hashes seen, max on top.
    sketch: BinaryHeap<u64>,
    members: HashSet<u64>,
}

impl DistinctCounter {
    pub fn new(budget: usize) -> Self {
        Self {
            budget: budget.max(16),
            exact: Some(HashSet::new()),
            sketch: BinaryHeap::new(),
            members: HashSet::new(),
        }
    }

    pub fn observe(&mut self, value: &Value) {
        let hash = value_hash(value);

        if let Some(exact) = &mut self.exact {
            exact.insert(hash);
            if exact.len() > self.budget {
                self.switch_to_sketch();
            }
            return;
        }

        self.sketch_insert(hash);
    }

    fn switch_to_sketch(&mut self) {
        let exact = match self.exact.take() {
            Some(set) => set,
            None => return,
        };
        let mut hashes: Vec<u64> = exact.into_iter().collect();
        hashes.sort_unstable();
        hashes.truncate(self.budget);
        self.members = hashes.iter().copied().collect();
        self.sketch = hashes.into_iter().collect();
    }

    fn sketch_insert(&mut self, hash: u64) {
        if self.members.contains(&hash) {
            return;
        }
        if self.sketch.len() < self.budget {
            self.sketch.push(hash);
            self.members.insert(hash);
            return;
        }
        if let Some(&max) = self.sketch.peek() {
            if hash < max {
                self.sketch.pop();
                self.members.remove(&max);
                self.sketch.push(hash);
                self.members.insert(hash);
            }
        }
    }

    pub fn is_exact(&self) -> bool {
        self.exact.is_some()
    }

    /// Estimated distinct count. Exact while under budget.
    pub fn estimate(&self) -> u64 {
        if let Some(exact) = &self.exact {
            return exact.len() as u64;
        }
        let k = self.sketch.len();
        if k < self.budget {
            return k as u64;
        }
        match self.sketch.peek() {
            Some(&max) if max > 0 => {
                let fraction = max as f64 / u64::MAX as f64;
                (((k - 1) as f64) / fraction).round() as u64
            }
            _ => k as u64,
        }
    }
}

fn value_hash(value: &Value) -> u64 {
    let digest = blake3::hash(value.key_repr().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

/// Streaming numeric accumulators for one column.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct NumericStats {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericStats {
    fn observe(&mut self, v: f64) {
        if self.count == 0 {
            self.min = v;
            self.max = v;
        } else {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self.count += 1;
        self.sum += v;
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Finished statistics for one column of one side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnAggregate {
    pub column: String,
    pub non_null_count: u64,
    pub distinct_count: u64,
    pub distinct_is_estimated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Bounded sample of distinct values for low-cardinality columns.
    pub distinct_sample: Vec<String>,
}

/// Accumulates statistics for one column while its side streams past.
pub struct ColumnAggregator {
    column: String,
    non_null: u64,
    distinct: DistinctCounter,
    numeric: NumericStats,
    saw_non_numeric: bool,
    sample: IndexSet<String>,
}

impl ColumnAggregator {
    pub fn new(column: impl Into<String>, distinct_budget: usize) -> Self {
        Self {
            column: column.into(),
            non_null: 0,
            distinct: DistinctCounter::new(distinct_budget),
            numeric: NumericStats::default(),
            saw_non_numeric: false,
            sample: IndexSet::new(),
        }
    }

    pub fn observe(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        self.non_null += 1;
        self.distinct.observe(value);

        match value.as_f64() {
            Some(v) => self.numeric.observe(v),
            None => self.saw_non_numeric = true,
        }

        if self.sample.len() < DISTINCT_SAMPLE_LIMIT {
            self.sample.insert(value.display());
        }
    }

    pub fn finish(self) -> ColumnAggregate {
        let numeric = if self.numeric.count > 0 && !self.saw_non_numeric {
            Some(self.numeric.clone())
        } else {
            None
        };
        let mean = numeric.as_ref().and_then(|n| n.mean());

        ColumnAggregate {
            column: self.column,
            non_null_count: self.non_null,
            distinct_count: self.distinct.estimate(),
            distinct_is_estimated: !self.distinct.is_exact(),
            numeric,
            mean,
            distinct_sample: self.sample.into_iter().collect(),
        }
    }
}

/// Match verdict of the per-column source/target comparison table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateVerdict {
    Exact,
    WithinTolerance,
    Mismatch,
}

/// One row of the column comparison table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateComparison {
    pub source_column: String,
    pub target_column: String,
    pub source: ColumnAggregate,
    pub target: ColumnAggregate,
    pub verdict: AggregateVerdict,
}

/// Compare two finished column aggregates: counts must match exactly,
/// numeric accumulators may differ within the relative tolerance.
pub fn compare_aggregates(
    source_column: &str,
    target_column: &str,
    source: ColumnAggregate,
    target: ColumnAggregate,
    tolerance: f64,
) -> AggregateComparison {
    let counts_equal = source.non_null_count == target.non_null_count
        && source.distinct_count == target.distinct_count;

    let numeric_verdict = match (&source.numeric, &target.numeric) {
        (None, None) => Some(AggregateVerdict::Exact),
        (Some(a), Some(b)) => {
            if a.sum == b.sum && a.min == b.min && a.max == b.max {
                Some(AggregateVerdict::Exact)
            } else if close(a.sum, b.sum, tolerance)
                && close(a.min, b.min, tolerance)
                && close(a.max, b.max, tolerance)
            {
                Some(AggregateVerdict::WithinTolerance)
            } else {
                None
            }
        }
        _ => None,
    };

    let verdict = match (counts_equal, numeric_verdict) {
        (true, Some(AggregateVerdict::Exact)) => AggregateVerdict::Exact,
        (true, Some(AggregateVerdict::WithinTolerance)) => AggregateVerdict::WithinTolerance,
        _ => AggregateVerdict::Mismatch,
    };

    AggregateComparison {
        source_column: source_column.to_string(),
        target_column: target_column.to_string(),
        source,
        target,
        verdict,
    }
}

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_exact_under_budget() {
        let mut counter = DistinctCounter::new(100);
        for i in 0..50 {
            counter.observe(&Value::Int(i % 10));
        }
        assert!(counter.is_exact());
        assert_eq!(counter.estimate(), 10);
    }

    #[test]
    fn test_distinct_switches_to_sketch() {
        let mut counter = DistinctCounter::new(64);
        for i in 0..5000 {
            counter.observe(&Value::Int(i));
        }
        assert!(!counter.is_exact());
        let estimate = counter.estimate();
        // Rough estimator: allow a wide band but reject nonsense.
        assert!(estimate > 2000, "estimate too low: {}", estimate);
        assert!(estimate < 12000, "estimate too high: {}", estimate);
    }

    #[test]
    fn test_numeric_aggregates() {
        let mut agg = ColumnAggregator::new("amount", 1024);
        for v in [10.0, 20.0, 30.0] {
            agg.observe(&Value::Float(v));
        }
        agg.observe(&Value::Null);

        let result = agg.finish();
        assert_eq!(result.non_null_count, 3);
        assert_eq!(result.distinct_count, 3);
        let numeric = result.numeric.unwrap();
        assert_eq!(numeric.sum, 60.0);
        assert_eq!(numeric.min, 10.0);
        assert_eq!(numeric.max, 30.0);
        assert_eq!(result.mean, Some(20.0));
    }

    #[test]
    fn test_mixed_column_has_no_numeric_stats() {
        let mut agg = ColumnAggregator::new("code", 1024);
        agg.observe(&Value::Int(1));
        agg.observe(&Value::Text("x".to_string()));
        let result = agg.finish();
        assert!(result.numeric.is_none());
        assert_eq!(result.non_null_count, 2);
    }

    #[test]
    fn test_aggregate_comparison_verdicts() {
        let build = |sum: f64| {
            let mut agg = ColumnAggregator::new("v", 1024);
            agg.observe(&Value::Float(sum));
            agg.finish()
        };

        let exact = compare_aggregates("v", "v", build(10.0), build(10.0), 1e-5);
        assert_eq!(exact.verdict, AggregateVerdict::Exact);

        let tolerant = compare_aggregates("v", "v", build(10.0001), build(10.0002), 1e-3);
        assert_eq!(tolerant.verdict, AggregateVerdict::WithinTolerance);

        let mismatch = compare_aggregates("v", "v", build(10.0), build(99.0), 1e-5);
        assert_eq!(mismatch.verdict, AggregateVerdict::Mismatch);
    }
}
