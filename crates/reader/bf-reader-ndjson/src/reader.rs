//! NDJSON source implementation with true streaming support.
//!
//! Lines are read one at a time on a background task with bounded memory,
//! so inputs far larger than RAM can be processed.

use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use async_trait::async_trait;
use bf_error::{BfError, ReaderError, Result};
use bf_traits::{RecordSource, RecordStream};
use bf_types::{IndexedRecord, SkipReason, SourceItem};
use futures::Stream;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Read buffer size for the underlying file.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Positions buffered between the reader task and the consumer.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Compression type detected from file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

impl Compression {
    /// Detect compression from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        let name = path.to_string_lossy().to_lowercase();
        if name.ends_with(".gz") || name.ends_with(".gzip") {
            Compression::Gzip
        } else if name.ends_with(".zst") || name.ends_with(".zstd") {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// Streaming NDJSON record source.
///
/// Every physical line consumes one index, including blank and malformed
/// lines, so indices stay stable across runs regardless of parse failures.
/// Blank lines are skipped silently; malformed lines are logged with their
/// index and skipped.
#[derive(Debug, Clone)]
pub struct NdjsonSource {
    path: PathBuf,
    compression: Compression,
    channel_capacity: usize,
}

impl NdjsonSource {
    /// Create a source for a local file, detecting compression from its name.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let compression = Compression::from_path(&path);
        Self {
            path,
            compression,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Override the detected compression.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set how many positions may be buffered ahead of the consumer.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    async fn open_reader(&self) -> Result<Pin<Box<dyn AsyncBufRead + Send>>> {
        let display = self.path.display().to_string();
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| ReaderError::from_io(&display, e))?;

        let buffered = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        let reader: Pin<Box<dyn AsyncBufRead + Send>> = match self.compression {
            Compression::None => Box::pin(buffered),
            Compression::Gzip => Box::pin(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                GzipDecoder::new(buffered),
            )),
            Compression::Zstd => Box::pin(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                ZstdDecoder::new(buffered),
            )),
        };
        Ok(reader)
    }
}

#[async_trait]
impl RecordSource for NdjsonSource {
    async fn open(&self, start_index: u64) -> Result<RecordStream> {
        info!(
            path = %self.path.display(),
            start_index = start_index,
            compression = ?self.compression,
            "Opening NDJSON input for streaming"
        );

        let reader = self.open_reader().await?;
        let stream = NdjsonRecordStream::new(
            reader,
            start_index,
            self.channel_capacity,
            self.path.display().to_string(),
        );
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "ndjson"
    }
}

/// Decodes one trimmed, non-empty line into a source item.
fn parse_line(index: u64, line: &[u8]) -> SourceItem {
    match serde_json::from_slice::<Value>(line) {
        Ok(Value::Object(record)) => SourceItem::Record(IndexedRecord::new(index, record)),
        Ok(other) => {
            warn!(
                index = index,
                kind = json_kind(&other),
                "JSON line is not an object, skipping"
            );
            SourceItem::Skipped {
                index,
                reason: SkipReason::Malformed,
            }
        }
        Err(e) => {
            warn!(index = index, error = %e, "JSON decode error, skipping line");
            SourceItem::Skipped {
                index,
                reason: SkipReason::Malformed,
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Streaming producer of NDJSON positions.
///
/// A background task reads lines and sends decoded positions over a bounded
/// channel; dropping the stream stops the task at its next send.
struct NdjsonRecordStream {
    /// Receiver for positions from the background task
    receiver: Option<mpsc::Receiver<Result<SourceItem>>>,
}

impl NdjsonRecordStream {
    fn new(
        reader: Pin<Box<dyn AsyncBufRead + Send>>,
        start_index: u64,
        capacity: usize,
        path: String,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity);

        tokio::spawn(async move {
            let tx_err = tx.clone();
            if let Err(e) = Self::read_all_lines(reader, start_index, &path, tx).await {
                tracing::error!(path = %path, error = %e, "Error in NDJSON record stream");
                let _ = tx_err.send(Err(e)).await;
            }
        });

        Self { receiver: Some(rx) }
    }

    async fn read_all_lines(
        mut reader: Pin<Box<dyn AsyncBufRead + Send>>,
        start_index: u64,
        path: &str,
        tx: mpsc::Sender<Result<SourceItem>>,
    ) -> Result<()> {
        let mut line = Vec::with_capacity(1024);
        let mut index: u64 = 0;

        loop {
            line.clear();
            let bytes_read = reader.read_until(b'\n', &mut line).await.map_err(|e| {
                BfError::Reader(ReaderError::Io(format!(
                    "Failed to read line {index} of {path}: {e}"
                )))
            })?;

            if bytes_read == 0 {
                break; // EOF
            }

            if index < start_index {
                index += 1;
                continue;
            }

            let trimmed = line.trim_ascii();
            let item = if trimmed.is_empty() {
                trace!(index = index, "Blank line");
                SourceItem::Skipped {
                    index,
                    reason: SkipReason::Blank,
                }
            } else {
                parse_line(index, trimmed)
            };

            if tx.send(Ok(item)).await.is_err() {
                debug!(index = index, "Record stream dropped, stopping reader");
                return Ok(()); // Receiver dropped
            }
            index += 1;
        }

        debug!(path = %path, lines = index, "Finished reading NDJSON input");
        Ok(())
    }
}

impl Stream for NdjsonRecordStream {
    type Item = Result<SourceItem>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(ref mut rx) = self.receiver {
            match Pin::new(rx).poll_recv(cx) {
                Poll::Ready(Some(item)) => Poll::Ready(Some(item)),
                Poll::Ready(None) => {
                    self.receiver = None;
                    Poll::Ready(None)
                }
                Poll::Pending => Poll::Pending,
            }
        } else {
            Poll::Ready(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_ndjson_file(num_rows: usize) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".jsonl").unwrap();

        for i in 0..num_rows {
            writeln!(file, r#"{{"id": {}, "name": "name_{}", "score": {}}}"#, i, i, i % 100)
                .unwrap();
        }

        file
    }

    fn create_gzipped_ndjson_file(num_rows: usize) -> NamedTempFile {
        use flate2::write::GzEncoder;

        let mut file = NamedTempFile::with_suffix(".jsonl.gz").unwrap();

        {
            let mut encoder = GzEncoder::new(&mut file, flate2::Compression::default());
            for i in 0..num_rows {
                writeln!(encoder, r#"{{"id": {}}}"#, i).unwrap();
            }
            encoder.finish().unwrap();
        }

        file
    }

    async fn collect(source: &NdjsonSource, start: u64) -> Vec<SourceItem> {
        let mut stream = source.open(start).await.unwrap();
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item.unwrap());
        }
        items
    }

    fn record_ids(items: &[SourceItem]) -> Vec<u64> {
        items
            .iter()
            .filter_map(|item| match item {
                SourceItem::Record(r) => Some(r.index),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_read_local_ndjson() {
        let file = create_test_ndjson_file(100);
        let source = NdjsonSource::new(file.path());

        let items = collect(&source, 0).await;

        assert_eq!(items.len(), 100);
        assert_eq!(record_ids(&items), (0..100).collect::<Vec<_>>());
        match &items[42] {
            SourceItem::Record(r) => {
                assert_eq!(r.record["id"], 42);
                assert_eq!(r.record["name"], "name_42");
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_file_not_found() {
        let source = NdjsonSource::new("/nonexistent/file.jsonl");
        let result = source.open(0).await;

        match result.err().unwrap() {
            BfError::Reader(ReaderError::NotFound(_)) => {}
            e => panic!("Expected NotFound error, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_start_index_skips_without_emitting() {
        let file = create_test_ndjson_file(50);
        let source = NdjsonSource::new(file.path());

        let items = collect(&source, 30).await;

        assert_eq!(record_ids(&items), (30..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_start_index_past_end() {
        let file = create_test_ndjson_file(5);
        let source = NdjsonSource::new(file.path());

        assert!(collect(&source, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_and_blank_lines_keep_indices() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id": 0}}"#).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "[1, 2, 3]").unwrap();
        writeln!(file, "   ").unwrap();
        writeln!(file, r#"{{"id": 5}}"#).unwrap();

        let source = NdjsonSource::new(file.path());
        let items = collect(&source, 0).await;

        assert_eq!(items.len(), 6);
        assert_eq!(record_ids(&items), vec![0, 5]);
        assert_eq!(
            items[1],
            SourceItem::Skipped {
                index: 1,
                reason: SkipReason::Malformed
            }
        );
        assert_eq!(
            items[2],
            SourceItem::Skipped {
                index: 2,
                reason: SkipReason::Blank
            }
        );
        assert_eq!(
            items[3],
            SourceItem::Skipped {
                index: 3,
                reason: SkipReason::Malformed
            }
        );
    }

    #[tokio::test]
    async fn test_crlf_and_missing_trailing_newline() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"id\": 0}}\r\n{{\"id\": 1}}").unwrap();

        let source = NdjsonSource::new(file.path());
        let items = collect(&source, 0).await;

        assert_eq!(record_ids(&items), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{\"id\": \"\xff\xfe\"}\n{\"id\": 1}\n").unwrap();

        let source = NdjsonSource::new(file.path());
        let items = collect(&source, 0).await;

        assert_eq!(items.len(), 2);
        assert!(matches!(
            items[0],
            SourceItem::Skipped {
                reason: SkipReason::Malformed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_compression_detection() {
        assert_eq!(Compression::from_path(Path::new("f.jsonl")), Compression::None);
        assert_eq!(Compression::from_path(Path::new("f.jsonl.gz")), Compression::Gzip);
        assert_eq!(Compression::from_path(Path::new("f.jsonl.gzip")), Compression::Gzip);
        assert_eq!(Compression::from_path(Path::new("f.jsonl.zst")), Compression::Zstd);
        assert_eq!(Compression::from_path(Path::new("f.jsonl.zstd")), Compression::Zstd);
    }

    #[tokio::test]
    async fn test_read_gzipped_ndjson() {
        let file = create_gzipped_ndjson_file(100);
        let source = NdjsonSource::new(file.path());

        let items = collect(&source, 10).await;

        assert_eq!(record_ids(&items), (10..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_small_channel_streams_large_file() {
        let file = create_test_ndjson_file(10_000);
        let source = NdjsonSource::new(file.path()).with_channel_capacity(2);

        let items = collect(&source, 0).await;

        assert_eq!(items.len(), 10_000);
        assert_eq!(items.last().map(SourceItem::index), Some(9_999));
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_reader() {
        let file = create_test_ndjson_file(5_000);
        let source = NdjsonSource::new(file.path()).with_channel_capacity(4);

        let mut stream = source.open(0).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.index(), 0);
        drop(stream);
    }
}
