//! Record transform trait.

use bf_error::Result;
use bf_types::{Decision, Record, StatsMap};

/// A per-record transform and routing decision.
///
/// Each worker context owns exactly one instance for its lifetime, so
/// implementations may keep mutable state (counters, compiled scripts)
/// without synchronization. Statistics accumulate across every record the
/// instance sees.
pub trait RecordTransform: Send {
    /// Processes one record.
    ///
    /// # Arguments
    ///
    /// * `record` - Input record (owned; may be modified in place)
    /// * `destination_count` - Number of configured outputs
    ///
    /// # Returns
    ///
    /// The record and its destination, or [`Decision::Drop`]. An error is a
    /// record-level failure: the caller logs it and drops the record.
    fn process(&mut self, record: Record, destination_count: usize) -> Result<Decision>;

    /// Returns the cumulative statistics of this instance.
    fn current_stats(&self) -> StatsMap;

    /// Returns the name of this transform for logging.
    fn name(&self) -> &str {
        "transform"
    }
}

impl<T: RecordTransform + ?Sized> RecordTransform for Box<T> {
    fn process(&mut self, record: Record, destination_count: usize) -> Result<Decision> {
        (**self).process(record, destination_count)
    }

    fn current_stats(&self) -> StatsMap {
        (**self).current_stats()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
