//! Logging initialization.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::LogLevel;

/// Log file for a run: `{dir}/{name}_{YYYYmmdd_HHMMSS}.log`.
pub fn log_file_path(dir: &Path, name: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{name}_{stamp}.log"))
}

/// Initialize logging with the specified level.
///
/// Logs are written to stderr so stdout remains clean for program output.
/// `RUST_LOG` directives, when set, refine the level. With `log_file`, every
/// line is also written (without ANSI colors) to that file; its directory is
/// created if needed.
pub fn init_logging(level: LogLevel, log_file: Option<&Path>) -> Result<()> {
    let level: Level = level.into();
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating log directory {}", dir.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("installing log subscriber")?;

    Ok(())
}
