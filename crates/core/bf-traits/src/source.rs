//! Record source trait.

use async_trait::async_trait;
use bf_error::Result;
use bf_types::SourceItem;
use futures::Stream;
use std::pin::Pin;

/// A stream of input positions, in strictly increasing index order.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<SourceItem>> + Send>>;

/// Trait for streaming record sources.
///
/// Sources read lazily with bounded memory and assign each input position
/// a stable 0-based index.
///
/// # Implementations
///
/// - NDJSON source: one index per physical line, malformed lines included
/// - Parquet source: index is the global row ordinal
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Opens the input and streams positions from `start_index` onward.
    ///
    /// Positions before `start_index` are passed over without being decoded
    /// or emitted.
    async fn open(&self, start_index: u64) -> Result<RecordStream>;

    /// Returns the name of this source for logging.
    fn name(&self) -> &str {
        "source"
    }
}
