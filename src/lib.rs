//! # tabcompare
//!
//! A streaming comparison engine for tabular datasets: reconciles the
//! schemas of two heterogeneous inputs, joins them on user-chosen keys,
//! and computes row/column level differences under bounded memory.

pub mod cli;
pub mod error;
pub mod handle;
pub mod value;
pub mod schema;
pub mod mapping;
pub mod reader;
pub mod duckdb_config;
pub mod spill;
pub mod join;
pub mod aggregate;
pub mod engine;
pub mod report;
pub mod commands;
pub mod output;
pub mod progress;

pub use engine::{run_comparison, ComparisonRequest, EngineConfig};
pub use error::{CompareError, ErrorReport, Result};
pub use handle::{DatasetHandle, DatasetKind};
pub use report::ComparisonReport;

/// Default chunk size for streaming row batches
pub const DEFAULT_CHUNK_SIZE: usize = 10000;

/// Default relative tolerance for numeric comparisons
pub const DEFAULT_NUMERIC_TOLERANCE: f64 = 1e-5;

/// Default number of spill partitions for the join
pub const DEFAULT_PARTITION_COUNT: usize = 64;
