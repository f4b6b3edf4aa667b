//! Command-line interface for tabcompare

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tabcompare")]
#[command(about = "A streaming comparison engine for tabular datasets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare a source dataset against a target dataset
    Compare {
        /// Source file path (csv, dat, parquet)
        source: String,

        /// Target file path (csv, dat, parquet)
        target: String,

        /// Join key column (source-side name); repeat for compound keys
        #[arg(long = "join-key", required = true)]
        join_keys: Vec<String>,

        /// Manual mapping override as src_col=tgt_col; repeatable
        #[arg(long = "map", value_parser = parse_override)]
        overrides: Vec<(String, String)>,

        /// Source column to exclude from comparison; repeatable
        #[arg(long = "exclude")]
        excluded: Vec<String>,

        /// Relative tolerance for numeric comparisons
        #[arg(long, default_value_t = crate::DEFAULT_NUMERIC_TOLERANCE)]
        tolerance: f64,

        /// Rows per batch when streaming either input (must be > 0)
        #[arg(long, default_value = "10000", value_parser = validate_chunk_size)]
        chunk_size: usize,

        /// Column delimiter for delimited file inputs
        #[arg(long, default_value = ",")]
        delimiter: char,

        /// Malformed record policy: "skip" or "abort"
        #[arg(long = "on-malformed", default_value = "skip")]
        on_malformed: String,

        /// Accept fuzzy column-mapping suggestions without confirmation
        #[arg(long)]
        accept_suggestions: bool,

        /// Acknowledge duplicate join-key values (one-to-many pairings)
        #[arg(long)]
        allow_duplicate_keys: bool,

        /// Overall time budget in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Write the full report payload as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Show the schema and row count of a dataset
    Inspect {
        /// Input file path (csv, dat, parquet)
        input: String,

        /// Column delimiter for delimited file inputs
        #[arg(long, default_value = ",")]
        delimiter: char,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },
}

/// Parse malformed record policy string
#[derive(Debug, Clone)]
pub enum MalformedMode {
    Skip,
    Abort,
}

impl MalformedMode {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            _ => Err(format!(
                "Invalid malformed-record policy: {}. Use 'skip' or 'abort'",
                s
            )),
        }
    }
}

/// Parse output format string
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

/// Parse a src_col=tgt_col override pair
fn parse_override(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((src, tgt)) if !src.is_empty() && !tgt.is_empty() => {
            Ok((src.to_string(), tgt.to_string()))
        }
        _ => Err(format!(
            "Invalid mapping override: '{}'. Expected src_col=tgt_col",
            s
        )),
    }
}

/// Validate that chunk size is greater than 0
fn validate_chunk_size(s: &str) -> Result<usize, String> {
    let chunk_size: usize = s
        .parse()
        .map_err(|_| format!("Invalid chunk size: '{}'. Must be a positive integer.", s))?;

    if chunk_size == 0 {
        return Err("Chunk size must be greater than 0".to_string());
    }

    Ok(chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_mode_parse() {
        assert!(matches!(MalformedMode::parse("skip"), Ok(MalformedMode::Skip)));
        assert!(matches!(MalformedMode::parse("ABORT"), Ok(MalformedMode::Abort)));
        assert!(MalformedMode::parse("ignore").is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert!(matches!(OutputFormat::parse("pretty"), Ok(OutputFormat::Pretty)));
        assert!(matches!(OutputFormat::parse("json"), Ok(OutputFormat::Json)));
        assert!(OutputFormat::parse("xml").is_err());
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("cust_id=CustomerID").unwrap(),
            ("cust_id".to_string(), "CustomerID".to_string())
        );
        assert!(parse_override("no_equals").is_err());
        assert!(parse_override("=tgt").is_err());
    }

    #[test]
    fn test_validate_chunk_size() {
        assert_eq!(validate_chunk_size("500").unwrap(), 500);
        assert!(validate_chunk_size("0").is_err());
        assert!(validate_chunk_size("abc").is_err());
    }
}
