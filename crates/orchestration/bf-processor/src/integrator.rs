//! Result integration disciplines.

use crate::pool::BatchResult;
use async_trait::async_trait;
use bf_error::Result;
use bf_types::{IndexSpan, Outcome, Record};
use bf_writer::OutputRouter;
use std::collections::BTreeMap;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{trace, warn};

/// Tracks which index spans have been resolved and the contiguous watermark.
///
/// A span is resolved once every outcome it produced has been written (or,
/// for dropped and failed records, once its batch has returned). The
/// watermark is the end of the longest run of resolved spans starting at the
/// run's start index; everything below it is safe to checkpoint.
#[derive(Debug)]
pub struct SpanTracker {
    next_index: u64,
    completed: BTreeMap<u64, (u64, Option<OwnedSemaphorePermit>)>,
}

impl SpanTracker {
    pub fn new(start_index: u64) -> Self {
        Self {
            next_index: start_index,
            completed: BTreeMap::new(),
        }
    }

    /// First index not yet covered by the contiguous resolved prefix.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Spans resolved out of order, waiting for a gap to close.
    pub fn waiting(&self) -> usize {
        self.completed.len()
    }

    /// Marks `span` resolved. The permit is held until the watermark passes it.
    ///
    /// Returns the new watermark if it advanced.
    pub fn complete(&mut self, span: IndexSpan, permit: Option<OwnedSemaphorePermit>) -> Option<u64> {
        if span.end <= self.next_index {
            warn!(span = %span, next_index = self.next_index, "Span already resolved");
            return None;
        }
        self.completed.insert(span.start, (span.end, permit));

        let before = self.next_index;
        while let Some((end, _permit)) = self.completed.remove(&self.next_index) {
            self.next_index = end;
        }
        (self.next_index > before).then_some(self.next_index)
    }
}

/// Effect of integrating one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Records written to the outputs
    pub written: u64,

    /// New contiguous watermark, when it advanced
    pub advanced_to: Option<u64>,
}

/// Writes completed batches to the outputs.
///
/// The coordinator is the only caller, so implementations own their
/// buffers without synchronization.
#[async_trait]
pub trait ResultIntegrator: Send {
    /// Integrates one completed batch.
    async fn integrate(&mut self, result: BatchResult, outputs: &mut OutputRouter) -> Result<Resolution>;

    /// Writes whatever is still buffered, in ascending index order.
    ///
    /// Returns the number of records written.
    async fn finish(&mut self, outputs: &mut OutputRouter) -> Result<u64>;

    /// Contiguous resolved watermark.
    fn next_index(&self) -> u64;

    /// Outcomes buffered but not yet written.
    fn pending(&self) -> usize;

    /// Discipline name for logging.
    fn name(&self) -> &'static str;
}

/// Creates the integrator for a run.
pub fn create_integrator(keep_order: bool, start_index: u64) -> Box<dyn ResultIntegrator> {
    if keep_order {
        Box::new(OrderedIntegrator::new(start_index))
    } else {
        Box::new(UnorderedIntegrator::new(start_index))
    }
}

/// Writes every outcome as soon as its batch arrives.
///
/// Output order follows batch completion order. The in-flight permit is
/// released right after the batch is written.
///
/// Batches beyond the watermark are written (and flushed with the next
/// advance) before the checkpoint covers them, so a crash in between
/// produces duplicates of those records when the run resumes.
#[derive(Debug)]
pub struct UnorderedIntegrator {
    spans: SpanTracker,
}

impl UnorderedIntegrator {
    pub fn new(start_index: u64) -> Self {
        Self {
            spans: SpanTracker::new(start_index),
        }
    }
}

#[async_trait]
impl ResultIntegrator for UnorderedIntegrator {
    async fn integrate(&mut self, result: BatchResult, outputs: &mut OutputRouter) -> Result<Resolution> {
        let BatchResult {
            span,
            outcomes,
            permit,
            ..
        } = result;

        let written = outcomes.len() as u64;
        for outcome in outcomes {
            outputs.write(outcome.destination, &outcome.record).await?;
        }
        drop(permit);

        let advanced_to = self.spans.complete(span, None);
        Ok(Resolution {
            written,
            advanced_to,
        })
    }

    async fn finish(&mut self, _outputs: &mut OutputRouter) -> Result<u64> {
        Ok(0)
    }

    fn next_index(&self) -> u64 {
        self.spans.next_index()
    }

    fn pending(&self) -> usize {
        0
    }

    fn name(&self) -> &'static str {
        "unordered"
    }
}

/// Buffers outcomes by index and releases only the contiguous prefix.
///
/// Dropped and failed records leave no outcome, but their batch's span still
/// resolves them, so the prefix advances across them. Within each output the
/// written indices are strictly increasing regardless of completion order.
#[derive(Debug)]
pub struct OrderedIntegrator {
    spans: SpanTracker,
    buffer: BTreeMap<u64, (Record, usize)>,
}

impl OrderedIntegrator {
    pub fn new(start_index: u64) -> Self {
        Self {
            spans: SpanTracker::new(start_index),
            buffer: BTreeMap::new(),
        }
    }
}

async fn write_in_order(
    entries: BTreeMap<u64, (Record, usize)>,
    outputs: &mut OutputRouter,
) -> Result<u64> {
    let mut written = 0;
    for (_index, (record, destination)) in entries {
        outputs.write(destination, &record).await?;
        written += 1;
    }
    Ok(written)
}

#[async_trait]
impl ResultIntegrator for OrderedIntegrator {
    async fn integrate(&mut self, result: BatchResult, outputs: &mut OutputRouter) -> Result<Resolution> {
        let BatchResult {
            span,
            outcomes,
            permit,
            ..
        } = result;

        let watermark = self.spans.next_index();
        for Outcome {
            index,
            record,
            destination,
        } in outcomes
        {
            if index < watermark {
                warn!(index, watermark, "Outcome below flushed watermark, discarding");
                continue;
            }
            self.buffer.insert(index, (record, destination));
        }

        let Some(next) = self.spans.complete(span, permit) else {
            trace!(span = %span, buffered = self.buffer.len(), "Waiting for earlier spans");
            return Ok(Resolution::default());
        };

        let rest = self.buffer.split_off(&next);
        let ready = std::mem::replace(&mut self.buffer, rest);
        let written = write_in_order(ready, outputs).await?;

        trace!(next_index = next, written, buffered = self.buffer.len(), "Flushed contiguous prefix");
        Ok(Resolution {
            written,
            advanced_to: Some(next),
        })
    }

    async fn finish(&mut self, outputs: &mut OutputRouter) -> Result<u64> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        warn!(
            leftover = self.buffer.len(),
            next_index = self.spans.next_index(),
            unresolved_spans = self.spans.waiting(),
            "Outcomes left beyond the contiguous prefix, writing in index order"
        );
        write_in_order(std::mem::take(&mut self.buffer), outputs).await
    }

    fn next_index(&self) -> u64 {
        self.spans.next_index()
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn name(&self) -> &'static str {
        "ordered"
    }
}
