//! Parquet sink.

use crate::{create_parent_dirs, WriteMode};
use arrow::datatypes::Schema;
use arrow_json::reader::infer_json_schema_from_iterator;
use arrow_json::ReaderBuilder;
use async_trait::async_trait;
use bf_error::{BfError, Result, SinkError};
use bf_reader_parquet::ParquetSource;
use bf_traits::{OutputSink, RecordSource};
use bf_types::{Record, SourceItem};
use futures::StreamExt;
use parquet::arrow::ArrowWriter;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Rows encoded into one Arrow batch when writing.
const ENCODE_CHUNK_ROWS: usize = 8192;

/// Parquet output accumulated in memory.
///
/// Columnar files cannot be appended to row by row, so records are held
/// until [`OutputSink::finish`], which infers a schema from all rows and
/// writes the file in one pass. Nothing is written when no rows were
/// collected. Until then, nothing written through this sink is durable.
#[derive(Debug)]
pub struct ParquetSink {
    path: PathBuf,
    rows: Vec<Value>,
    written: u64,
    finished: bool,
}

impl ParquetSink {
    /// Opens a Parquet output.
    ///
    /// In [`WriteMode::Append`] the rows of an existing file are loaded
    /// first so the final file holds the earlier run's rows followed by
    /// this run's. In [`WriteMode::Truncate`] an existing file is removed.
    pub async fn open(path: impl Into<PathBuf>, mode: WriteMode) -> Result<Self> {
        let path = path.into();
        create_parent_dirs(&path).await?;

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| SinkError::Create {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let rows = match mode {
            WriteMode::Append if exists => load_existing_rows(&path).await?,
            WriteMode::Append => Vec::new(),
            WriteMode::Truncate => {
                if exists {
                    // A run that ends with no rows must not leave the old file behind
                    tokio::fs::remove_file(&path)
                        .await
                        .map_err(|e| SinkError::Create {
                            path: path.display().to_string(),
                            reason: e.to_string(),
                        })?;
                }
                Vec::new()
            }
        };

        debug!(
            path = %path.display(),
            mode = ?mode,
            existing_rows = rows.len(),
            "Opened Parquet output"
        );

        Ok(Self {
            path,
            rows,
            written: 0,
            finished: false,
        })
    }
}

async fn load_existing_rows(path: &Path) -> Result<Vec<Value>> {
    let mut stream = ParquetSource::new(path).open(0).await?;
    let mut rows = Vec::new();
    while let Some(item) = stream.next().await {
        if let SourceItem::Record(r) = item? {
            rows.push(Value::Object(r.record));
        }
    }
    info!(path = %path.display(), rows = rows.len(), "Loaded existing Parquet output");
    Ok(rows)
}

/// Writes rows to `path` through a temporary file in the same directory.
fn write_parquet(path: &Path, rows: &[Value]) -> Result<()> {
    let encode_err = |e: &dyn std::fmt::Display| -> BfError {
        SinkError::Encode(format!("{}: {e}", path.display())).into()
    };
    let write_err = |e: &dyn std::fmt::Display| -> BfError {
        SinkError::Write(format!("{}: {e}", path.display())).into()
    };

    let schema: Arc<Schema> = Arc::new(
        infer_json_schema_from_iterator(rows.iter().map(Ok)).map_err(|e| encode_err(&e))?,
    );

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| SinkError::Create {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    {
        let mut writer =
            ArrowWriter::try_new(tmp.as_file_mut(), schema.clone(), None).map_err(|e| write_err(&e))?;

        for chunk in rows.chunks(ENCODE_CHUNK_ROWS) {
            let mut decoder = ReaderBuilder::new(schema.clone())
                .with_batch_size(chunk.len())
                .with_coerce_primitive(true)
                .build_decoder()
                .map_err(|e| encode_err(&e))?;
            decoder.serialize(chunk).map_err(|e| encode_err(&e))?;
            if let Some(batch) = decoder.flush().map_err(|e| encode_err(&e))? {
                writer.write(&batch).map_err(|e| write_err(&e))?;
            }
        }

        writer.close().map_err(|e| write_err(&e))?;
    }

    tmp.as_file().sync_all().map_err(|e| write_err(&e))?;
    tmp.persist(path).map_err(|e| write_err(&e.error))?;
    Ok(())
}

#[async_trait]
impl OutputSink for ParquetSink {
    async fn write(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(SinkError::Write(format!("{} is already closed", self.path.display())).into());
        }
        self.rows.push(Value::Object(record.clone()));
        self.written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        // Rows stay in memory until finish
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        if self.rows.is_empty() {
            debug!(path = %self.path.display(), "No rows collected, skipping Parquet write");
            return Ok(());
        }

        let rows = std::mem::take(&mut self.rows);
        let path = self.path.clone();
        let total = rows.len();

        tokio::task::spawn_blocking(move || write_parquet(&path, &rows))
            .await
            .map_err(|e| SinkError::Write(format!("Parquet writer task failed: {e}")))??;

        info!(
            path = %self.path.display(),
            rows = total,
            written_this_run = self.written,
            "Wrote Parquet output"
        );
        Ok(())
    }

    fn durable_on_flush(&self) -> bool {
        false
    }

    fn records_written(&self) -> u64 {
        self.written
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
