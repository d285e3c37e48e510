//! Resume position persistence.

use bf_error::{CheckpointError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Suffix appended to the primary output path.
const CHECKPOINT_SUFFIX: &str = ".checkpoint";

/// Reads and atomically replaces the checkpoint file.
///
/// The file holds the next unread input index as ASCII decimal. Writes go
/// to a temporary file in the same directory that is synced and renamed
/// over the old one, so a reader sees either the old or the new value.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    path: PathBuf,
}

impl CheckpointManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint location for a run whose first output is `output`.
    pub fn for_output(output: &Path) -> Self {
        let mut path = output.as_os_str().to_owned();
        path.push(CHECKPOINT_SUFFIX);
        Self::new(PathBuf::from(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the saved next index, or 0.
    ///
    /// A missing file means a fresh start. An unreadable or corrupt file is
    /// logged and also treated as 0.
    pub async fn read(&self) -> u64 {
        match self.try_read().await {
            Ok(Some(index)) => {
                info!(path = %self.path.display(), next_index = index, "Resuming from checkpoint");
                index
            }
            Ok(None) => 0,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unusable checkpoint");
                0
            }
        }
    }

    async fn try_read(&self) -> Result<Option<u64>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CheckpointError::Read(format!("{}: {e}", self.path.display())).into())
            }
        };

        let index = contents
            .trim()
            .parse::<u64>()
            .map_err(|e| CheckpointError::Corrupt(format!("{:?}: {e}", contents.trim())))?;
        Ok(Some(index))
    }

    /// Persists `next_index`.
    pub async fn write(&self, next_index: u64) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, next_index))
            .await
            .map_err(|e| CheckpointError::Write(format!("checkpoint task failed: {e}")))??;

        debug!(path = %self.path.display(), next_index, "Wrote checkpoint");
        Ok(())
    }

    /// Deletes the checkpoint file if it exists.
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Removed checkpoint");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::Write(format!("{}: {e}", self.path.display())).into()),
        }
    }
}

fn write_atomic(path: &Path, next_index: u64) -> Result<()> {
    let write_err = |e: &dyn std::fmt::Display| CheckpointError::Write(format!("{}: {e}", path.display()));

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| write_err(&e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| write_err(&e))?;
    write!(tmp, "{next_index}").map_err(|e| write_err(&e))?;
    tmp.as_file().sync_all().map_err(|e| write_err(&e))?;
    tmp.persist(path).map_err(|e| write_err(&e.error))?;
    Ok(())
}
