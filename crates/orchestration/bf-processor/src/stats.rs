//! Statistics aggregation and the final report.

use crate::pool::BatchResult;
use bf_error::{Result, SinkError};
use bf_types::StatsMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Merges the statistics of every completed batch.
///
/// Workers send the change in their transform's cumulative statistics with
/// each batch, so summing those deltas gives each worker's final totals,
/// and summing across workers gives the run's. Non-numeric values are
/// last-write-wins in completion order.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    merged: StatsMap,
    batches: u64,
    submitted: u64,
    failed: u64,
    malformed: u64,
}

/// Coordinator-level figures added to the report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunTotals {
    pub written: u64,
    pub start_index: u64,
    pub next_index: u64,
    pub elapsed: Duration,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorbs one batch's statistics and counters.
    pub fn absorb(&mut self, result: &BatchResult) {
        self.merged.merge(&result.stats);
        self.batches += 1;
        self.submitted += result.submitted;
        self.failed += result.failed;
        self.malformed += result.malformed;
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Records given to a transform.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Records dropped because the transform failed on them.
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Input positions that could not be decoded.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Merged transform statistics alone.
    pub fn merged(&self) -> &StatsMap {
        &self.merged
    }

    /// Builds the final report.
    pub fn report(&self, totals: &RunTotals) -> StatsMap {
        let seconds = totals.elapsed.as_secs_f64();
        let speed = if seconds > 0.0 {
            totals.written as f64 / seconds
        } else {
            0.0
        };

        let mut report = self.merged.clone();
        report.insert("total_processed", self.submitted);
        report.insert("total_output", totals.written);
        report.insert("total_failed", self.failed);
        report.insert("total_malformed", self.malformed);
        report.insert("start_index", totals.start_index);
        report.insert("next_index", totals.next_index);
        report.insert("processing_time_seconds", round3(seconds));
        report.insert("average_speed_rows_per_second", round3(speed));
        report
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Writes the report as pretty-printed JSON, creating parent directories.
pub async fn write_report(path: &Path, report: &StatsMap) -> Result<()> {
    let create_err = |e: &dyn std::fmt::Display| SinkError::Create {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| create_err(&e))?;
        }
    }

    let mut json = serde_json::to_vec_pretty(report).map_err(|e| SinkError::Encode(e.to_string()))?;
    json.push(b'\n');
    tokio::fs::write(path, json).await.map_err(|e| create_err(&e))?;

    info!(path = %path.display(), "Wrote statistics report");
    Ok(())
}
