//! Line-delimited JSON sink.

use crate::{create_parent_dirs, WriteMode};
use async_trait::async_trait;
use bf_error::{Result, SinkError};
use bf_traits::OutputSink;
use bf_types::Record;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, trace};

/// Write buffer size (8 MiB).
const WRITE_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Buffered JSONL output.
///
/// Records are appended to an in-process buffer; [`OutputSink::flush`]
/// writes the buffer and syncs file data, after which everything written so
/// far survives a crash.
pub struct JsonlSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    line: Vec<u8>,
    written: u64,
}

impl std::fmt::Debug for JsonlSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlSink")
            .field("path", &self.path)
            .field("written", &self.written)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

impl JsonlSink {
    /// Opens (creating parent directories) a JSONL output.
    pub async fn open(path: impl Into<PathBuf>, mode: WriteMode) -> Result<Self> {
        let path = path.into();
        create_parent_dirs(&path).await?;

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Truncate => options.write(true).truncate(true),
            WriteMode::Append => options.append(true),
        };

        let file = options.open(&path).await.map_err(|e| SinkError::Create {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), mode = ?mode, "Opened JSONL output");

        Ok(Self {
            path,
            writer: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
            line: Vec::with_capacity(1024),
            written: 0,
        })
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None => Err(SinkError::Write(format!(
                "{} is already closed",
                self.path.display()
            ))
            .into()),
        }
    }

    async fn sync(writer: &mut BufWriter<File>, path: &Path) -> Result<()> {
        writer
            .flush()
            .await
            .map_err(|e| SinkError::Flush(format!("{}: {e}", path.display())))?;
        writer
            .get_ref()
            .sync_data()
            .await
            .map_err(|e| SinkError::Flush(format!("{}: {e}", path.display())))?;
        Ok(())
    }
}

#[async_trait]
impl OutputSink for JsonlSink {
    async fn write(&mut self, record: &Record) -> Result<()> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, record)
            .map_err(|e| SinkError::Encode(e.to_string()))?;
        self.line.push(b'\n');

        let line = std::mem::take(&mut self.line);
        let result = self.writer()?.write_all(&line).await;
        self.line = line;
        result.map_err(|e| SinkError::Write(format!("{}: {e}", self.path.display())))?;

        self.written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let path = self.path.clone();
        let writer = self.writer()?;
        Self::sync(writer, &path).await?;
        trace!(path = %path.display(), "Flushed JSONL output");
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            Self::sync(&mut writer, &self.path).await?;
            debug!(
                path = %self.path.display(),
                records = self.written,
                "Closed JSONL output"
            );
        }
        Ok(())
    }

    fn durable_on_flush(&self) -> bool {
        true
    }

    fn records_written(&self) -> u64 {
        self.written
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
