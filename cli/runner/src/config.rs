//! Builds the run configuration from a config file and command-line flags.

use crate::args::Cli;
use anyhow::{anyhow, Context, Result};
use bf_types::{FileFormat, RunConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// A run configuration file. Every key is optional; keys match [`RunConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub input_path: Option<PathBuf>,
    pub output_paths: Option<Vec<PathBuf>>,
    pub stats_path: Option<PathBuf>,
    pub transform: Option<String>,
    pub script_path: Option<PathBuf>,
    pub format: Option<FileFormat>,
    pub workers: Option<usize>,
    pub keep_order: Option<bool>,
    pub batch_size: Option<usize>,
    pub max_in_flight: Option<usize>,
    pub resume: Option<bool>,
    pub progress_interval_secs: Option<u64>,
    pub shutdown_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Reads a `.json` file as JSON and anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            serde_yaml::from_str(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        };

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

/// Merges flags over the config file (if any) and validates the result.
pub fn build_config(cli: &Cli) -> Result<RunConfig> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    merge(cli, file)
}

fn merge(cli: &Cli, file: FileConfig) -> Result<RunConfig> {
    let input = cli
        .input
        .clone()
        .or(file.input_path)
        .context("no input file (use --input or input_path)")?;
    let outputs = if cli.outputs.is_empty() {
        file.output_paths.unwrap_or_default()
    } else {
        cli.outputs.clone()
    };
    let stats = cli
        .stats
        .clone()
        .or(file.stats_path)
        .context("no stats file (use --stats or stats_path)")?;
    let transform = cli
        .transform
        .clone()
        .or(file.transform)
        .context("no transform (use --transform or transform)")?;

    let mut config = RunConfig::new(input, outputs, stats, transform)
        .with_keep_order(cli.keep_order || file.keep_order.unwrap_or(false))
        .with_resume(!cli.no_resume && file.resume.unwrap_or(true));

    if let Some(script) = cli.script.clone().or(file.script_path) {
        config = config.with_script_path(script);
    }
    if let Some(format) = cli.format.map(FileFormat::from).or(file.format) {
        config = config.with_format(format);
    }
    if let Some(workers) = cli.workers.or(file.workers) {
        config = config.with_workers(workers);
    }
    if let Some(size) = cli.batch_size.or(file.batch_size) {
        config = config.with_batch_size(size);
    }
    if let Some(limit) = cli.max_in_flight.or(file.max_in_flight) {
        config = config.with_max_in_flight(limit);
    }
    if let Some(secs) = cli.progress_interval.or(file.progress_interval_secs) {
        config = config.with_progress_interval(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.shutdown_timeout.or(file.shutdown_timeout_secs) {
        config = config.with_shutdown_timeout(Duration::from_secs(secs));
    }

    config.validate().map_err(|e| anyhow!("{}", e))?;
    Ok(config)
}
