//! Run configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk format shared by the input and every output of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// One JSON object per line
    Jsonl,

    /// Apache Parquet
    Parquet,
}

impl FileFormat {
    /// Infers the format from a file extension.
    ///
    /// Compression suffixes (`.gz`, `.zst`) are looked through.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        let name = name
            .strip_suffix(".gz")
            .or_else(|| name.strip_suffix(".zst"))
            .unwrap_or(&name);

        if name.ends_with(".jsonl") || name.ends_with(".ndjson") || name.ends_with(".json") {
            Some(Self::Jsonl)
        } else if name.ends_with(".parquet") || name.ends_with(".pq") {
            Some(Self::Parquet)
        } else {
            None
        }
    }

    /// Parses a format tag.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jsonl" | "ndjson" | "json" => Some(Self::Jsonl),
            "parquet" => Some(Self::Parquet),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jsonl => write!(f, "jsonl"),
            Self::Parquet => write!(f, "parquet"),
        }
    }
}

/// Parameters for a single processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Input file
    pub input_path: PathBuf,

    /// Output files, addressed by destination index
    pub output_paths: Vec<PathBuf>,

    /// Where the final statistics report is written
    pub stats_path: PathBuf,

    /// Registered transform name
    pub transform: String,

    /// Script file for the `rhai` transform
    #[serde(default)]
    pub script_path: Option<PathBuf>,

    /// File format (inferred from the input extension when absent)
    #[serde(default)]
    pub format: Option<FileFormat>,

    /// Number of worker contexts
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Preserve input order within each output
    #[serde(default)]
    pub keep_order: bool,

    /// Records per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum batches dispatched but not yet flushed (defaults to `workers * 4`)
    #[serde(default)]
    pub max_in_flight: Option<usize>,

    /// Continue from an existing checkpoint
    #[serde(default = "default_resume")]
    pub resume: bool,

    /// Interval between progress log lines
    #[serde(
        rename = "progress_interval_secs",
        default = "default_progress_interval",
        with = "duration_secs"
    )]
    pub progress_interval: Duration,

    /// Time to wait for workers to drain on shutdown
    #[serde(
        rename = "shutdown_timeout_secs",
        default = "default_shutdown_timeout",
        with = "duration_secs"
    )]
    pub shutdown_timeout: Duration,
}

fn default_workers() -> usize {
    num_cpus()
}

fn default_batch_size() -> usize {
    1000
}

fn default_resume() -> bool {
    true
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

impl RunConfig {
    /// Creates a configuration with defaults for everything but the paths and transform.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_paths: Vec<PathBuf>,
        stats_path: impl Into<PathBuf>,
        transform: impl Into<String>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_paths,
            stats_path: stats_path.into(),
            transform: transform.into(),
            script_path: None,
            format: None,
            workers: default_workers(),
            keep_order: false,
            batch_size: default_batch_size(),
            max_in_flight: None,
            resume: default_resume(),
            progress_interval: default_progress_interval(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }

    /// Set the script file for the `rhai` transform.
    pub fn with_script_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_path = Some(path.into());
        self
    }

    /// Set the file format explicitly.
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the number of worker contexts.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Enable or disable order preservation.
    pub fn with_keep_order(mut self, keep_order: bool) -> Self {
        self.keep_order = keep_order;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the in-flight batch limit.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Enable or disable resuming from a checkpoint.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Set the progress log interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// The format in effect: explicit, or inferred from the input path.
    pub fn effective_format(&self) -> Result<FileFormat, String> {
        self.format
            .or_else(|| FileFormat::from_path(&self.input_path))
            .ok_or_else(|| {
                format!(
                    "cannot infer file format from '{}'; set it explicitly",
                    self.input_path.display()
                )
            })
    }

    /// The in-flight batch limit in effect.
    pub fn effective_max_in_flight(&self) -> usize {
        self.max_in_flight
            .unwrap_or_else(|| self.workers.saturating_mul(4))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.input_path.as_os_str().is_empty() {
            return Err("input_path must not be empty".to_string());
        }
        if self.output_paths.is_empty() {
            return Err("at least one output path is required".to_string());
        }
        if self.transform.trim().is_empty() {
            return Err("transform must not be empty".to_string());
        }
        if self.workers == 0 {
            return Err("workers must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        if self.max_in_flight == Some(0) {
            return Err("max_in_flight must be at least 1".to_string());
        }
        if self.progress_interval.is_zero() {
            return Err("progress_interval must be at least 1 second".to_string());
        }

        let mut seen = HashSet::new();
        for path in &self.output_paths {
            if path == &self.input_path {
                return Err(format!(
                    "output '{}' is the same file as the input",
                    path.display()
                ));
            }
            if !seen.insert(path) {
                return Err(format!("output '{}' is listed twice", path.display()));
            }
        }

        self.effective_format()?;
        Ok(())
    }
}

/// Get the number of available CPUs.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Serde helper for whole-second durations.
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
