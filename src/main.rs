//! Main entry point for tabcompare CLI

use clap::Parser;
use tabcompare::cli::Cli;
use tabcompare::commands::execute_command;
use tabcompare::duckdb_config;
use tabcompare::error::ErrorReport;

fn main() {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // Parse command line arguments
    let cli = Cli::parse();

    // Set up verbose logging if requested
    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    // Initialize and validate DuckDB configuration
    if let Err(e) = duckdb_config::init_duckdb() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    // Execute the command; failures surface as structured errors
    if let Err(e) = execute_command(cli.command) {
        let report = ErrorReport::from(&e);
        eprintln!("Error [{}]: {}", report.kind, report.message);
        if let Some(columns) = &report.offending_columns {
            eprintln!("  offending columns: {}", columns.join(", "));
        }
        if let Some(row) = report.row_index {
            eprintln!("  row index: {}", row);
        }
        if let Some(phase) = &report.phase {
            eprintln!("  phase: {}", phase);
        }
        std::process::exit(1);
    }
}
