//! batchflow CLI
//!
//! Parallel record processing from one input file to several outputs.

use bf_cli_common::{format_duration, format_number, format_rate, init_logging, log_file_path};
use bf_error::ErrorCategory;
use bf_processor::RunSummary;
use clap::Parser;
use std::path::PathBuf;

mod args;
mod config;
mod run;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config = match config::build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(ErrorCategory::Setup.exit_code());
        }
    };

    // Logs go to stderr so stdout stays clean
    let log_file = args
        .log_dir
        .as_deref()
        .map(|dir| log_file_path(dir, &config.transform));
    if let Err(e) = init_logging(args.log_level, log_file.as_deref()) {
        eprintln!("Error: {e:#}");
        std::process::exit(ErrorCategory::Setup.exit_code());
    }

    let outputs = config.output_paths.clone();

    match run::execute(config).await {
        Ok(summary) => {
            print_summary("Run completed", &summary, &outputs);
            if summary.has_record_errors() {
                std::process::exit(ErrorCategory::Record.exit_code()); // Partial failure
            }
            Ok(())
        }
        Err(failure) => {
            if let Some(summary) = &failure.summary {
                print_summary("Run stopped", summary, &outputs);
            }
            eprintln!("Error: {failure}");
            std::process::exit(failure.category().exit_code());
        }
    }
}

fn print_summary(title: &str, summary: &RunSummary, outputs: &[PathBuf]) {
    eprintln!();
    eprintln!("{title}:");
    if summary.start_index > 0 {
        eprintln!("  Resumed at:        {}", format_number(summary.start_index));
    }
    eprintln!("  Next index:        {}", format_number(summary.next_index));
    eprintln!("  Batches:           {}", format_number(summary.batches));
    eprintln!("  Records processed: {}", format_number(summary.submitted));
    eprintln!("  Records written:   {}", format_number(summary.written));
    for (path, written) in outputs.iter().zip(&summary.written_per_destination) {
        eprintln!("    {}: {}", path.display(), format_number(*written));
    }
    if summary.has_record_errors() {
        eprintln!(
            "  Errors:            {} failed, {} malformed",
            format_number(summary.failed),
            format_number(summary.malformed)
        );
    }
    eprintln!("  Duration:          {}", format_duration(summary.elapsed));
    eprintln!("  Throughput:        {}", format_rate(summary.rows_per_second()));
}
