//! Text length bucketing transform.

use bf_error::Result;
use bf_traits::RecordTransform;
use bf_types::{Decision, Record, StatsMap};
use serde_json::Value;

/// Bucket boundaries and length limits, in characters.
const MIN_LENGTH: usize = 10;
const MAX_LENGTH: usize = 1000;
const SHORT_BELOW: usize = 100;
const MEDIUM_BELOW: usize = 500;

/// Routes records by the character length of `text` (or `content`).
///
/// Texts shorter than 10 or longer than 1000 characters are dropped. The
/// rest gain `text_length` and `length_category` and are routed `short` → 0,
/// `medium` → 1, `long` → 2. The destination is not adjusted to the number
/// of outputs; selecting a missing output is reported as an error.
#[derive(Debug, Default)]
pub struct TextLengthFilter {
    total_processed: i64,
    short: i64,
    medium: i64,
    long: i64,
}

impl TextLengthFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

fn text_of(record: &Record) -> &str {
    ["text", "content"]
        .iter()
        .filter_map(|key| record.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

impl RecordTransform for TextLengthFilter {
    fn process(&mut self, mut record: Record, _destination_count: usize) -> Result<Decision> {
        self.total_processed += 1;

        let length = text_of(&record).chars().count();
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
            return Ok(Decision::Drop);
        }

        let (category, destination) = if length < SHORT_BELOW {
            self.short += 1;
            ("short", 0)
        } else if length < MEDIUM_BELOW {
            self.medium += 1;
            ("medium", 1)
        } else {
            self.long += 1;
            ("long", 2)
        };

        record.insert("text_length".to_string(), Value::from(length));
        record.insert("length_category".to_string(), Value::from(category));
        Ok(Decision::emit(record, destination))
    }

    fn current_stats(&self) -> StatsMap {
        let mut stats = StatsMap::new();
        stats.insert("total_processed", self.total_processed);
        stats.insert("short", self.short);
        stats.insert("medium", self.medium);
        stats.insert("long", self.long);
        stats
    }

    fn name(&self) -> &str {
        "text_length_filter"
    }
}
