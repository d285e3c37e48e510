//! Parquet source implementation using the async record batch stream.

use crate::convert::batch_to_records;
use async_trait::async_trait;
use bf_error::{BfError, ReaderError, Result};
use bf_traits::{RecordSource, RecordStream};
use bf_types::{IndexedRecord, SourceItem};
use futures::StreamExt;
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;
use std::path::PathBuf;
use tracing::{debug, info, trace};

/// Rows decoded per internal read, independent of the run's batch size.
const DEFAULT_READ_BATCH_SIZE: usize = 8192;

/// Streaming Parquet record source.
///
/// Row groups are fetched on demand; rows before the start index are
/// skipped by the decoder rather than materialized.
#[derive(Debug, Clone)]
pub struct ParquetSource {
    path: PathBuf,
    read_batch_size: usize,
}

impl ParquetSource {
    /// Create a source for a local Parquet file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
        }
    }

    /// Set the number of rows decoded per internal read.
    pub fn with_read_batch_size(mut self, size: usize) -> Self {
        self.read_batch_size = size.max(1);
        self
    }
}

#[async_trait]
impl RecordSource for ParquetSource {
    async fn open(&self, start_index: u64) -> Result<RecordStream> {
        let path_str = self.path.display().to_string();
        info!(path = %path_str, start_index = start_index, "Opening Parquet input for streaming");

        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| ReaderError::from_io(&path_str, e))?;

        let builder = ParquetRecordBatchStreamBuilder::new(file)
            .await
            .map_err(|e| {
                BfError::Reader(ReaderError::InvalidFormat(format!(
                    "Failed to read Parquet metadata for '{}': {}",
                    path_str, e
                )))
            })?;

        let total_rows = u64::try_from(builder.metadata().file_metadata().num_rows()).unwrap_or(0);
        debug!(
            path = %path_str,
            row_groups = builder.metadata().num_row_groups(),
            total_rows = total_rows,
            read_batch_size = self.read_batch_size,
            "Building async stream"
        );

        if start_index >= total_rows {
            debug!(path = %path_str, "Start index past end of input, nothing to read");
            return Ok(Box::pin(futures::stream::empty()));
        }

        let offset = usize::try_from(start_index).map_err(|_| {
            BfError::Reader(ReaderError::Io(format!(
                "Start index {start_index} exceeds addressable rows"
            )))
        })?;

        let stream = builder
            .with_batch_size(self.read_batch_size)
            .with_offset(offset)
            .build()
            .map_err(|e| {
                BfError::Reader(ReaderError::InvalidFormat(format!(
                    "Failed to build Parquet stream for '{}': {}",
                    path_str, e
                )))
            })?;

        // Global row ordinal of the next row the decoder yields
        let mut next_index = start_index;
        let items = stream
            .map(move |result| {
                let items: Vec<Result<SourceItem>> = match result {
                    Ok(record_batch) => match batch_to_records(&record_batch) {
                        Ok(records) => {
                            trace!(
                                first_index = next_index,
                                rows = records.len(),
                                "Streamed Parquet batch"
                            );
                            records
                                .into_iter()
                                .map(|record| {
                                    let index = next_index;
                                    next_index += 1;
                                    Ok(SourceItem::Record(IndexedRecord::new(index, record)))
                                })
                                .collect()
                        }
                        Err(e) => vec![Err(e)],
                    },
                    Err(e) => vec![Err(BfError::Reader(ReaderError::Parse(format!(
                        "Failed to read rows from {}: {}",
                        next_index, e
                    ))))],
                };
                futures::stream::iter(items)
            })
            .flatten();

        Ok(Box::pin(items))
    }

    fn name(&self) -> &str {
        "parquet"
    }
}
