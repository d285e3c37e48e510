//! Destination-indexed output router.

use crate::{JsonlSink, ParquetSink, WriteMode};
use bf_error::{Result, SinkError};
use bf_traits::OutputSink;
use bf_types::{FileFormat, Record};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Opens the sink matching `format` at `path`.
pub async fn create_sink(
    path: &Path,
    format: FileFormat,
    mode: WriteMode,
) -> Result<Box<dyn OutputSink>> {
    let sink: Box<dyn OutputSink> = match format {
        FileFormat::Jsonl => Box::new(JsonlSink::open(path, mode).await?),
        FileFormat::Parquet => Box::new(ParquetSink::open(path, mode).await?),
    };
    Ok(sink)
}

/// A fixed set of output sinks addressed by destination index.
///
/// The router is the only writer of its sinks. Destination indices outside
/// `[0, len)` are rejected, never remapped.
pub struct OutputRouter {
    sinks: Vec<Box<dyn OutputSink>>,
}

impl std::fmt::Debug for OutputRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let paths: Vec<&Path> = self.sinks.iter().map(|s| s.path()).collect();
        f.debug_struct("OutputRouter").field("sinks", &paths).finish()
    }
}

impl OutputRouter {
    /// Wraps already-open sinks.
    pub fn new(sinks: Vec<Box<dyn OutputSink>>) -> Self {
        Self { sinks }
    }

    /// Opens one sink per path, in order.
    ///
    /// If any sink fails to open, the ones already opened are closed before
    /// the error is returned.
    pub async fn open(paths: &[PathBuf], format: FileFormat, mode: WriteMode) -> Result<Self> {
        let mut router = Self::new(Vec::with_capacity(paths.len()));

        for path in paths {
            match create_sink(path, format, mode).await {
                Ok(sink) => router.sinks.push(sink),
                Err(e) => {
                    if let Err(close_err) = router.finish_all().await {
                        warn!(error = %close_err, "Failed to close outputs after open error");
                    }
                    return Err(e);
                }
            }
        }

        debug!(outputs = router.len(), format = %format, "Opened outputs");
        Ok(router)
    }

    /// Number of destinations.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether the router has no destinations.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Writes a record to one destination.
    pub async fn write(&mut self, destination: usize, record: &Record) -> Result<()> {
        let count = self.sinks.len();
        let sink = self
            .sinks
            .get_mut(destination)
            .ok_or(SinkError::InvalidDestination { destination, count })?;
        sink.write(record).await
    }

    /// Flushes every sink.
    pub async fn flush_all(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.flush().await?;
        }
        Ok(())
    }

    /// Finishes every sink, even if some fail.
    ///
    /// Returns the first error encountered.
    pub async fn finish_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.finish().await {
                warn!(path = %sink.path().display(), error = %e, "Failed to close output");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether a flush makes every destination durable.
    pub fn durable_on_flush(&self) -> bool {
        self.sinks.iter().all(|s| s.durable_on_flush())
    }

    /// Records written to each destination during this run.
    pub fn written_per_destination(&self) -> Vec<u64> {
        self.sinks.iter().map(|s| s.records_written()).collect()
    }

    /// Records written across all destinations during this run.
    pub fn records_written(&self) -> u64 {
        self.sinks.iter().map(|s| s.records_written()).sum()
    }
}
