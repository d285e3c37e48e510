//! Output sink trait.

use async_trait::async_trait;
use bf_error::Result;
use bf_types::Record;
use std::path::Path;

/// One output destination.
///
/// Sinks are opened once per run and written through a buffer; only
/// [`OutputSink::flush`] and [`OutputSink::finish`] make data durable.
#[async_trait]
pub trait OutputSink: Send {
    /// Appends one record.
    async fn write(&mut self, record: &Record) -> Result<()>;

    /// Pushes buffered records to stable storage, if the format allows it.
    async fn flush(&mut self) -> Result<()>;

    /// Completes the output. No writes are accepted afterwards.
    async fn finish(&mut self) -> Result<()>;

    /// Whether records are durable after [`OutputSink::flush`].
    ///
    /// Formats that materialize only at [`OutputSink::finish`] return false.
    fn durable_on_flush(&self) -> bool;

    /// Records written during this run.
    fn records_written(&self) -> u64;

    /// Output location.
    fn path(&self) -> &Path;
}
