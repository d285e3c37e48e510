//! Record-level types.

use serde_json::{Map, Value};

/// A single record: an ordered mapping from field name to JSON value.
pub type Record = Map<String, Value>;

/// A record tagged with its 0-based position in the original input.
///
/// The index is assigned once by the record source and never recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    /// Position in the input stream
    pub index: u64,

    /// Record payload
    pub record: Record,
}

impl IndexedRecord {
    /// Creates a new indexed record.
    pub fn new(index: u64, record: Record) -> Self {
        Self { index, record }
    }
}

/// Why a source position produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Empty or whitespace-only line
    Blank,

    /// Line could not be decoded into a record
    Malformed,
}

/// One position of the input stream.
///
/// Skipped positions still consume an index so indices stay stable across runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceItem {
    /// A decoded record
    Record(IndexedRecord),

    /// A position that yielded nothing
    Skipped { index: u64, reason: SkipReason },
}

impl SourceItem {
    /// Index of this position.
    pub fn index(&self) -> u64 {
        match self {
            Self::Record(r) => r.index,
            Self::Skipped { index, .. } => *index,
        }
    }
}

/// A transform's decision for one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Write the (possibly modified) record to the given destination.
    Emit { record: Record, destination: usize },

    /// Produce no output for this record.
    Drop,
}

impl Decision {
    /// Shorthand for an emit decision.
    pub fn emit(record: Record, destination: usize) -> Self {
        Self::Emit {
            record,
            destination,
        }
    }

    /// Whether this decision drops the record.
    pub fn is_drop(&self) -> bool {
        matches!(self, Self::Drop)
    }
}

/// A non-dropped result for one input record.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Original input index
    pub index: u64,

    /// Transformed record
    pub record: Record,

    /// Output sink index, validated against the output count
    pub destination: usize,
}
