//! Batch types.

use crate::record::IndexedRecord;

/// A half-open range `[start, end)` of input indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexSpan {
    /// First index covered
    pub start: u64,

    /// One past the last index covered
    pub end: u64,
}

impl IndexSpan {
    /// Creates a new span.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Self { start, end }
    }

    /// Number of indices covered.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the span covers no indices.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `index` falls inside the span.
    pub fn contains(&self, index: u64) -> bool {
        self.start <= index && index < self.end
    }
}

impl std::fmt::Display for IndexSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A batch of records handed to exactly one worker context.
///
/// The span covers every input index this batch accounts for, including
/// skipped positions that produced no record. Consecutive batches have
/// adjacent spans, so resolving every batch resolves every index.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Sequence number, in submission order
    pub id: u64,

    /// Indices this batch resolves
    pub span: IndexSpan,

    /// Records in source order
    pub records: Vec<IndexedRecord>,

    /// Positions in the span skipped as malformed
    pub malformed: u64,
}

impl Batch {
    /// Creates a new batch.
    pub fn new(id: u64, span: IndexSpan, records: Vec<IndexedRecord>) -> Self {
        Self {
            id,
            span,
            records,
            malformed: 0,
        }
    }

    /// Sets the malformed count.
    pub fn with_malformed(mut self, malformed: u64) -> Self {
        self.malformed = malformed;
        self
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch carries no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
