//! Processing coordinator for batchflow.
//!
//! This crate wires a record source to a pool of transform workers and
//! writes their results to the output sinks:
//!
//! ```text
//! RecordSource → Batcher → WorkRouter → workers (blocking threads)
//!                                            │
//!          CheckpointManager ← ResultIntegrator ← results channel
//! ```
//!
//! - [`Batcher`] - Groups source items into batches with adjacent index spans
//! - [`WorkRouter`] - Distributes batches to worker queues
//! - [`WorkerPool`] - Worker contexts, one transform instance each
//! - [`OrderedIntegrator`] / [`UnorderedIntegrator`] - Result integration disciplines
//! - [`CheckpointManager`] - Atomic persistence of the resume position
//! - [`StatsAggregator`] - Merged transform statistics and run totals
//! - [`Processor`] - The coordinator

mod batcher;
mod checkpoint;
mod integrator;
mod pool;
mod processor;
mod router;
mod stats;

pub use batcher::Batcher;
pub use checkpoint::CheckpointManager;
pub use integrator::{
    create_integrator, OrderedIntegrator, Resolution, ResultIntegrator, SpanTracker,
    UnorderedIntegrator,
};
pub use pool::{BatchResult, Work, WorkerPool};
pub use processor::{Processor, RunFailure, RunSummary};
pub use router::WorkRouter;
pub use stats::{write_report, RunTotals, StatsAggregator};
