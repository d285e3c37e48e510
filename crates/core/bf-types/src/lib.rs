//! Core types for batchflow.
//!
//! This crate provides the foundational types used throughout the system:
//! - [`IndexedRecord`] - A record tagged with its position in the input
//! - [`Batch`] - A run of records plus the index span it resolves
//! - [`Outcome`] - What a transform produced for one record
//! - [`StatsMap`] - Mergeable metric map
//! - [`RunConfig`] - Parameters for a single run

pub mod batch;
pub mod config;
pub mod record;
pub mod stats;

pub use batch::*;
pub use config::*;
pub use record::*;
pub use stats::*;
