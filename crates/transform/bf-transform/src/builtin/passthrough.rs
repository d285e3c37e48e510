//! Identity transform.

use bf_error::Result;
use bf_traits::RecordTransform;
use bf_types::{Decision, Record, StatsMap};

/// Emits every record unchanged to destination 0.
#[derive(Debug, Default)]
pub struct Passthrough {
    total_processed: i64,
}

impl Passthrough {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordTransform for Passthrough {
    fn process(&mut self, record: Record, _destination_count: usize) -> Result<Decision> {
        self.total_processed += 1;
        Ok(Decision::emit(record, 0))
    }

    fn current_stats(&self) -> StatsMap {
        let mut stats = StatsMap::new();
        stats.insert("total_processed", self.total_processed);
        stats
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_passthrough_is_identity() {
        let mut t = Passthrough::new();
        let mut record = Record::new();
        record.insert("id".to_string(), json!(7));
        record.insert("nested".to_string(), json!({"a": [1, 2]}));

        let decision = t.process(record.clone(), 3).unwrap();

        assert_eq!(decision, Decision::emit(record, 0));
        assert_eq!(t.current_stats().get_i64("total_processed"), Some(1));
    }
}
