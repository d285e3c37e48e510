//! NDJSON (Newline-Delimited JSON) record source.
//!
//! This crate provides a streaming source that implements the `RecordSource`
//! trait for local NDJSON files, with optional gzip/zstd decompression.
//!
//! # Example
//!
//! ```ignore
//! use bf_reader_ndjson::NdjsonSource;
//! use bf_traits::RecordSource;
//!
//! let source = NdjsonSource::new("data/input.jsonl");
//! let mut stream = source.open(0).await?;
//!
//! while let Some(item) = stream.next().await {
//!     println!("position {}", item?.index());
//! }
//! ```

mod reader;

pub use reader::{Compression, NdjsonSource};
