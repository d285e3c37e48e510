//! Score threshold transform.

use bf_error::{Result, TransformError};
use bf_traits::RecordTransform;
use bf_types::{Decision, Record, StatsMap};
use serde_json::Value;

/// Minimum passing score.
const PASS_THRESHOLD: f64 = 60.0;

/// Grades records by their numeric `score` field.
///
/// Passing records (score ≥ 60) go to destination 0 with `status: "passed"`
/// and a letter grade. Failing records get `status: "failed"`, grade `F`,
/// and go to destination 1 when a second output exists; otherwise they are
/// dropped. A missing or null score counts as 0.
#[derive(Debug, Default)]
pub struct ScoreFilter {
    total_processed: i64,
    passed: i64,
    failed: i64,
}

impl ScoreFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

fn grade(score: f64) -> &'static str {
    if score >= 90.0 {
        "A"
    } else if score >= 80.0 {
        "B"
    } else if score >= 70.0 {
        "C"
    } else if score >= PASS_THRESHOLD {
        "D"
    } else {
        "F"
    }
}

impl RecordTransform for ScoreFilter {
    fn process(&mut self, mut record: Record, destination_count: usize) -> Result<Decision> {
        self.total_processed += 1;

        let score = match record.get("score") {
            None | Some(Value::Null) => 0.0,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(other) => {
                return Err(TransformError::Execution(format!(
                    "score must be numeric, got {other}"
                ))
                .into())
            }
        };

        if score >= PASS_THRESHOLD {
            self.passed += 1;
            record.insert("status".to_string(), Value::from("passed"));
            record.insert("grade".to_string(), Value::from(grade(score)));
            return Ok(Decision::emit(record, 0));
        }

        self.failed += 1;
        record.insert("status".to_string(), Value::from("failed"));
        record.insert("grade".to_string(), Value::from("F"));
        if destination_count > 1 {
            Ok(Decision::emit(record, 1))
        } else {
            Ok(Decision::Drop)
        }
    }

    fn current_stats(&self) -> StatsMap {
        let mut stats = StatsMap::new();
        stats.insert("total_processed", self.total_processed);
        stats.insert("passed", self.passed);
        stats.insert("failed", self.failed);
        stats
    }

    fn name(&self) -> &str {
        "score_filter"
    }
}
