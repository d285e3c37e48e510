//! CLI argument definitions for batchflow.

use bf_cli_common::parse_positive_usize;
pub use bf_cli_common::LogLevel;
use bf_types::FileFormat;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Runs every record of an input file through a transform and writes the
/// results to one or more outputs.
///
/// Progress is checkpointed next to the first output, so an interrupted
/// run continues where it stopped unless `--no-resume` is given.
///
/// ## Examples
///
/// Split scores into passed and failed:
///   batchflow -i scores.jsonl -o passed.jsonl -o failed.jsonl -s stats.json -t score_filter
///
/// Run a script over Parquet with ordered output:
///   batchflow -i in.parquet -o out.parquet -s stats.json -t rhai --script clean.rhai --keep-order
///
/// Take everything from a config file, overriding the worker count:
///   batchflow --config run.yaml -w 4
#[derive(Parser, Debug)]
#[command(name = "batchflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Files ===
    /// Input file (JSONL, optionally .gz/.zst, or Parquet)
    #[arg(short = 'i', long, env = "BF_INPUT")]
    pub input: Option<PathBuf>,

    /// Output file; repeat for additional destinations
    #[arg(short = 'o', long = "output", env = "BF_OUTPUT", value_delimiter = ',')]
    pub outputs: Vec<PathBuf>,

    /// Statistics report file (JSON)
    #[arg(short = 's', long, env = "BF_STATS")]
    pub stats: Option<PathBuf>,

    /// File format of input and outputs (inferred from the extension when omitted)
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<FormatArg>,

    /// Run configuration file (YAML or JSON); flags override its values
    #[arg(long, env = "BF_CONFIG")]
    pub config: Option<PathBuf>,

    // === Transform ===
    /// Transform name
    #[arg(short = 't', long, env = "BF_TRANSFORM")]
    pub transform: Option<String>,

    /// Script file for the `rhai` transform
    #[arg(long, env = "BF_SCRIPT")]
    pub script: Option<PathBuf>,

    // === Processing ===
    /// Number of worker contexts (must be >= 1)
    #[arg(short = 'w', long, env = "BF_WORKERS", value_parser = parse_positive_usize)]
    pub workers: Option<usize>,

    /// Write outputs in input order
    #[arg(long)]
    pub keep_order: bool,

    /// Records per batch (must be >= 1)
    #[arg(short = 'b', long, env = "BF_BATCH_SIZE", value_parser = parse_positive_usize)]
    pub batch_size: Option<usize>,

    /// Maximum batches dispatched but not yet resolved (default: workers * 4)
    #[arg(long, value_parser = parse_positive_usize)]
    pub max_in_flight: Option<usize>,

    /// Ignore any checkpoint and start from the first record
    #[arg(long)]
    pub no_resume: bool,

    /// Progress log interval in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub progress_interval: Option<u64>,

    /// Shutdown timeout in seconds (time to wait for workers to drain)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub shutdown_timeout: Option<u64>,

    // === Logging ===
    /// Log level
    #[arg(short = 'l', long, value_enum, default_value = "info", env = "BF_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Also write logs to a timestamped file in this directory
    #[arg(long, env = "BF_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// File format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// One JSON object per line
    Jsonl,
    /// Apache Parquet
    Parquet,
}

impl From<FormatArg> for FileFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Jsonl => FileFormat::Jsonl,
            FormatArg::Parquet => FileFormat::Parquet,
        }
    }
}
