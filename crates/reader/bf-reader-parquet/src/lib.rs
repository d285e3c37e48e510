//! Parquet record source.
//!
//! Streams row groups with `ParquetRecordBatchStreamBuilder`, seeking past
//! already-processed rows, and yields each row as a JSON record indexed by
//! its global row ordinal.

mod convert;
mod reader;

pub use convert::batch_to_records;
pub use reader::ParquetSource;
