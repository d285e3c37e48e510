//! Record transforms for batchflow.
//!
//! Transforms are looked up by name in a closed [`TransformRegistry`]:
//!
//! | Name | Behavior |
//! |------|----------|
//! | `passthrough` | identity, destination 0 |
//! | `score_filter` | grade by `score`; pass → 0, fail → 1 or drop |
//! | `text_length_filter` | bucket by text length into destinations 0/1/2 |
//! | `field_extractor` | keep a fixed set of (possibly nested) fields |
//! | `data_enricher` | add hash, timestamp and numeric summaries |
//! | `rhai` | user script, see [`ScriptTransform`] |
//!
//! # Script Example
//!
//! ```rhai
//! // Drop debug records, route errors to the second output
//! if record.level == "DEBUG" {
//!     return ();
//! }
//! stats.seen = (stats.seen ?? 0) + 1;
//! record.processed_at = timestamp();
//! if record.level == "ERROR" && destinations > 1 {
//!     [record, 1]
//! } else {
//!     record
//! }
//! ```

pub mod builtin;
mod config;
mod functions;
mod registry;
mod script;

pub use config::TransformSpec;
pub use registry::{TransformFactory, TransformRegistry};
pub use script::ScriptTransform;
