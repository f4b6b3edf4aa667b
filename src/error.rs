//! Error types for tabcompare operations

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompareError>;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Malformed record at row {row_index}: {message}")]
    MalformedRecord { row_index: u64, message: String },

    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        message: String,
        offending_columns: Vec<String>,
    },

    #[error("Comparison aborted during {phase}: {message}")]
    ComparisonAborted { phase: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl CompareError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: msg.into(),
        }
    }

    pub fn malformed_record(row_index: u64, msg: impl Into<String>) -> Self {
        Self::MalformedRecord {
            row_index,
            message: msg.into(),
        }
    }

    pub fn schema_mismatch(msg: impl Into<String>, columns: Vec<String>) -> Self {
        Self::SchemaMismatch {
            message: msg.into(),
            offending_columns: columns,
        }
    }

    pub fn aborted(phase: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ComparisonAborted {
            phase: phase.into(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Stable kind string used in structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::DuckDb(_) => "duckdb",
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::MalformedRecord { .. } => "malformed_record",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::ComparisonAborted { .. } => "comparison_aborted",
            Self::Config { .. } => "config",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Cancelled => "cancelled",
            Self::Generic(_) => "generic",
        }
    }
}

/// Structured error object surfaced to callers in place of raw errors.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offending_columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl From<&CompareError> for ErrorReport {
    fn from(err: &CompareError) -> Self {
        let mut report = ErrorReport {
            kind: err.kind().to_string(),
            message: err.to_string(),
            offending_columns: None,
            row_index: None,
            phase: None,
        };

        match err {
            CompareError::SchemaMismatch {
                offending_columns, ..
            } => {
                report.offending_columns = Some(offending_columns.clone());
            }
            CompareError::MalformedRecord { row_index, .. } => {
                report.row_index = Some(*row_index);
            }
            CompareError::ComparisonAborted { phase, .. } => {
                report.phase = Some(phase.clone());
            }
            _ => {}
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = CompareError::source_unavailable("cannot open");
        assert_eq!(err.kind(), "source_unavailable");

        let err = CompareError::schema_mismatch("bad types", vec!["id".to_string()]);
        assert_eq!(err.kind(), "schema_mismatch");
    }

    #[test]
    fn test_error_report_carries_context() {
        let err = CompareError::schema_mismatch(
            "join key 'id' is TEXT in source but INTEGER in target",
            vec!["id".to_string()],
        );
        let report = ErrorReport::from(&err);
        assert_eq!(report.kind, "schema_mismatch");
        assert_eq!(report.offending_columns, Some(vec!["id".to_string()]));

        let err = CompareError::malformed_record(42, "unparseable value");
        let report = ErrorReport::from(&err);
        assert_eq!(report.row_index, Some(42));

        let err = CompareError::aborted("join", "memory budget exceeded");
        let report = ErrorReport::from(&err);
        assert_eq!(report.phase.as_deref(), Some("join"));
    }
}
