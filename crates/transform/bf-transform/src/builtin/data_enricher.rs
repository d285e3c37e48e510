//! Derived-field enrichment transform.

use bf_error::{Result, TransformError};
use bf_traits::RecordTransform;
use bf_types::{Decision, Record, StatsMap};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

/// Hex characters of the digest kept in `content_hash`.
const HASH_PREFIX_LEN: usize = 8;

/// Adds derived fields to every record and emits it to output 0.
///
/// | Field           | Value                                                    |
/// |-----------------|----------------------------------------------------------|
/// | `processed_at`  | wall-clock time in epoch milliseconds                     |
/// | `content_hash`  | first 8 hex chars of SHA-256 over the key-sorted input JSON |
/// | `field_count`   | number of top-level fields in the input                   |
/// | `numeric_sum`   | sum of top-level numbers (booleans excluded), if any      |
/// | `numeric_avg`   | mean of the same values                                   |
#[derive(Debug, Default)]
pub struct DataEnricher {
    total_processed: i64,
    enriched: i64,
}

impl DataEnricher {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Rebuilds objects with keys in sorted order at every depth.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let sorted: Map<String, Value> = keys
                .into_iter()
                .map(|k| (k.clone(), canonical(&map[k])))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

pub(crate) fn content_hash(record: &Record) -> Result<String> {
    let bytes = serde_json::to_vec(&canonical(&Value::Object(record.clone())))
        .map_err(|e| TransformError::Execution(format!("Failed to encode record: {e}")))?;
    let digest = Sha256::digest(&bytes);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    Ok(hex[..HASH_PREFIX_LEN].to_string())
}

/// Sum and mean of the top-level numbers. The sum stays an integer while
/// every value is one and it does not overflow.
fn numeric_summary(record: &Record) -> Option<(Value, f64)> {
    let numbers: Vec<&Number> = record
        .values()
        .filter_map(|v| match v {
            Value::Number(n) => Some(n),
            _ => None,
        })
        .collect();
    if numbers.is_empty() {
        return None;
    }

    let float_sum: f64 = numbers.iter().filter_map(|n| n.as_f64()).sum();
    let avg = float_sum / numbers.len() as f64;

    let int_sum = numbers
        .iter()
        .try_fold(0i64, |acc, n| n.as_i64().and_then(|v| acc.checked_add(v)));
    let sum = match int_sum {
        Some(total) => Value::from(total),
        None => Number::from_f64(float_sum).map(Value::Number).unwrap_or(Value::Null),
    };

    Some((sum, avg))
}

impl RecordTransform for DataEnricher {
    fn process(&mut self, record: Record, _destination_count: usize) -> Result<Decision> {
        self.total_processed += 1;

        let hash = content_hash(&record)?;
        let field_count = record.len();
        let summary = numeric_summary(&record);

        let mut out = record;
        out.insert(
            "processed_at".to_string(),
            Value::from(chrono::Utc::now().timestamp_millis()),
        );
        out.insert("content_hash".to_string(), Value::from(hash));
        out.insert("field_count".to_string(), Value::from(field_count));
        if let Some((sum, avg)) = summary {
            out.insert("numeric_sum".to_string(), sum);
            out.insert(
                "numeric_avg".to_string(),
                Number::from_f64(avg).map(Value::Number).unwrap_or(Value::Null),
            );
        }

        self.enriched += 1;
        Ok(Decision::emit(out, 0))
    }

    fn current_stats(&self) -> StatsMap {
        let mut stats = StatsMap::new();
        stats.insert("total_processed", self.total_processed);
        stats.insert("enriched", self.enriched);
        stats
    }

    fn name(&self) -> &str {
        "data_enricher"
    }
}
