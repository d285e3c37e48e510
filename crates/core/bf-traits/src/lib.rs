//! Core traits for batchflow.
//!
//! - [`RecordSource`] - Streams indexed records from an input file
//! - [`RecordTransform`] - Per-record transform and routing decision
//! - [`OutputSink`] - One addressable output destination

pub mod sink;
pub mod source;
pub mod transform;

pub use sink::OutputSink;
pub use source::{RecordSource, RecordStream};
pub use transform::RecordTransform;
