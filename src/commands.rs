//! Command implementations for the tabcompare CLI

use std::path::Path;
use std::time::Duration;

use crate::cli::{Commands, MalformedMode, OutputFormat};
use crate::engine::{run_comparison_with, ComparisonRequest, EngineConfig, RunContext};
use crate::error::Result;
use crate::handle::DatasetHandle;
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::progress::{Phase, ProgressCounters, ProgressReporter, RunControl};
use crate::reader::{BatchSource, FileSource, MalformedPolicy};

/// Execute a command
pub fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Compare {
            source,
            target,
            join_keys,
            overrides,
            excluded,
            tolerance,
            chunk_size,
            delimiter,
            on_malformed,
            accept_suggestions,
            allow_duplicate_keys,
            timeout,
            output,
            format,
        } => compare_command(CompareArgs {
            source,
            target,
            join_keys,
            overrides,
            excluded,
            tolerance,
            chunk_size,
            delimiter,
            on_malformed,
            accept_suggestions,
            allow_duplicate_keys,
            timeout,
            output,
            format,
        }),
        Commands::Inspect {
            input,
            delimiter,
            format,
        } => inspect_command(&input, delimiter, &format),
    }
}

struct CompareArgs {
    source: String,
    target: String,
    join_keys: Vec<String>,
    overrides: Vec<(String, String)>,
    excluded: Vec<String>,
    tolerance: f64,
    chunk_size: usize,
    delimiter: char,
    on_malformed: String,
    accept_suggestions: bool,
    allow_duplicate_keys: bool,
    timeout: Option<u64>,
    output: Option<std::path::PathBuf>,
    format: String,
}

fn compare_command(args: CompareArgs) -> Result<()> {
    let format = OutputFormat::parse(&args.format).map_err(crate::CompareError::invalid_input)?;
    let malformed = MalformedMode::parse(&args.on_malformed)
        .map_err(crate::CompareError::invalid_input)?;

    let source = DatasetHandle::from_path(&args.source)?
        .with_delimiter(args.delimiter)
        .with_chunk_size(args.chunk_size);
    let target = DatasetHandle::from_path(&args.target)?
        .with_delimiter(args.delimiter)
        .with_chunk_size(args.chunk_size);

    let config = EngineConfig {
        numeric_tolerance: args.tolerance,
        malformed_policy: match malformed {
            MalformedMode::Skip => MalformedPolicy::Skip,
            MalformedMode::Abort => MalformedPolicy::Abort,
        },
        timeout: args.timeout.map(Duration::from_secs),
        ..EngineConfig::default()
    };

    let request = ComparisonRequest {
        source,
        target,
        column_overrides: args.overrides,
        join_keys: args.join_keys,
        excluded_columns: args.excluded,
        accept_suggestions: args.accept_suggestions,
        allow_duplicate_keys: args.allow_duplicate_keys,
        config,
    };

    let counters = ProgressCounters::new();
    let mut reporter = match format {
        OutputFormat::Pretty => ProgressReporter::new_for_comparison(),
        OutputFormat::Json => ProgressReporter::new_minimal(),
    };

    // The engine runs on its own thread so this one can observe the
    // shared counters for display.
    let engine_counters = counters.clone();
    let handle = std::thread::spawn(move || {
        let ctx = RunContext {
            provider: None,
            counters: engine_counters,
            control: RunControl::unbounded(),
        };
        run_comparison_with(&request, &ctx)
    });

    let mut read_done = false;
    while !handle.is_finished() {
        let snapshot = counters.snapshot();
        match snapshot.phase {
            Phase::Validate | Phase::Read => reporter.update_read(&snapshot),
            _ if !read_done => {
                reporter.finish_read(&format!(
                    "Read {} source rows, {} target rows",
                    snapshot.rows_read_source, snapshot.rows_read_target
                ));
                read_done = true;
            }
            _ => {}
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    let report = match handle.join() {
        Ok(result) => result?,
        Err(_) => {
            return Err(crate::CompareError::aborted(
                "run",
                "comparison thread panicked",
            ))
        }
    };
    reporter.finish_all("Comparison complete");

    if let Some(path) = &args.output {
        std::fs::write(path, JsonFormatter::format(&report)?)?;
        log::info!("Report payload written to {}", path.display());
    }

    match format {
        OutputFormat::Pretty => PrettyPrinter::print_report(&report),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&report)?),
    }

    Ok(())
}

fn inspect_command(input: &str, delimiter: char, format: &str) -> Result<()> {
    let format = OutputFormat::parse(format).map_err(crate::CompareError::invalid_input)?;

    if !Path::new(input).exists() {
        return Err(crate::CompareError::source_unavailable(format!(
            "File not found: {}",
            input
        )));
    }

    let handle = DatasetHandle::from_path(input)?.with_delimiter(delimiter);
    let source = FileSource::open(&handle, MalformedPolicy::Skip)?;

    match format {
        OutputFormat::Pretty => {
            PrettyPrinter::print_schema(input, source.schema(), source.row_count_hint())
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "input": input,
                "row_count": source.row_count_hint(),
                "columns": source.schema().columns,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
