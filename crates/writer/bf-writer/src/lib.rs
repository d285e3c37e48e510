//! Output sinks for batchflow.
//!
//! - [`JsonlSink`] - Buffered line-delimited JSON, durable on flush
//! - [`ParquetSink`] - In-memory accumulation written as one Parquet file on finish
//! - [`OutputRouter`] - Destination-indexed set of sinks

mod columnar;
mod jsonl;
mod router;

pub use columnar::ParquetSink;
pub use jsonl::JsonlSink;
pub use router::{create_sink, OutputRouter};

use bf_error::{Result, SinkError};
use std::path::Path;

/// How an existing output file is treated when a sink opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Discard existing contents (fresh run)
    Truncate,

    /// Keep existing contents and add after them (resumed run)
    Append,
}

/// Creates the parent directory of an output path.
pub(crate) async fn create_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SinkError::Create {
                    path: parent.display().to_string(),
                    reason: e.to_string(),
                })?;
        }
    }
    Ok(())
}
