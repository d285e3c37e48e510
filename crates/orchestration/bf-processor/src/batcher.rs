//! Fixed-size batching over a record stream.

use bf_error::Result;
use bf_traits::RecordStream;
use bf_types::{Batch, IndexSpan, SkipReason, SourceItem};
use futures::StreamExt;
use tracing::trace;

/// Groups a record stream into batches of up to `batch_size` records.
///
/// Every batch covers an index span that starts where the previous one
/// ended, so the spans of all batches tile the input from the start index
/// with no gaps. Skipped positions extend the current span without
/// counting towards the batch size. A trailing batch is produced when the
/// stream ends with a non-empty span, even if it holds no records.
pub struct Batcher {
    stream: RecordStream,
    batch_size: usize,
    next_start: u64,
    next_id: u64,
    exhausted: bool,
}

impl std::fmt::Debug for Batcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("batch_size", &self.batch_size)
            .field("next_start", &self.next_start)
            .field("next_id", &self.next_id)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl Batcher {
    /// Creates a batcher over a stream opened at `start_index`.
    ///
    /// `batch_size` must be at least 1.
    pub fn new(stream: RecordStream, batch_size: usize, start_index: u64) -> Self {
        Self {
            stream,
            batch_size: batch_size.max(1),
            next_start: start_index,
            next_id: 0,
            exhausted: false,
        }
    }

    /// Index the next batch will start at.
    pub fn next_start(&self) -> u64 {
        self.next_start
    }

    /// Pulls the next batch from the stream.
    ///
    /// Returns `Ok(None)` once the stream is exhausted. Stream errors are
    /// returned as they occur; records already collected for the current
    /// batch are discarded in that case.
    pub async fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.exhausted {
            return Ok(None);
        }

        let start = self.next_start;
        let mut end = start;
        let mut records = Vec::with_capacity(self.batch_size);
        let mut malformed = 0u64;

        while records.len() < self.batch_size {
            match self.stream.next().await {
                Some(item) => {
                    let item = item?;
                    end = end.max(item.index() + 1);
                    match item {
                        SourceItem::Record(record) => records.push(record),
                        SourceItem::Skipped {
                            reason: SkipReason::Malformed,
                            ..
                        } => malformed += 1,
                        SourceItem::Skipped { .. } => {}
                    }
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        if end == start {
            return Ok(None);
        }

        let batch = Batch::new(self.next_id, IndexSpan::new(start, end), records)
            .with_malformed(malformed);
        self.next_id += 1;
        self.next_start = end;

        trace!(
            batch_id = batch.id,
            span = %batch.span,
            records = batch.len(),
            malformed,
            "Built batch"
        );
        Ok(Some(batch))
    }
}
