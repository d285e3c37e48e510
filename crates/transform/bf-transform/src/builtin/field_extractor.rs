//! Field projection transform.

use bf_error::Result;
use bf_traits::RecordTransform;
use bf_types::{Decision, Record, StatsMap};
use serde_json::Value;

/// Fields kept when no explicit list is given.
pub const DEFAULT_FIELDS: [&str; 4] = ["id", "name", "value", "timestamp"];

/// Projects each record onto a fixed list of fields.
///
/// A field present at the top level is copied as is. Otherwise a dotted
/// path such as `user.name` descends into nested objects and the value is
/// written under `user_name`. Records with none of the fields are dropped.
#[derive(Debug)]
pub struct FieldExtractor {
    fields: Vec<String>,
    total_processed: i64,
    extracted: i64,
    skipped: i64,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::with_fields(DEFAULT_FIELDS)
    }
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts `fields` instead of the defaults.
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            total_processed: 0,
            extracted: 0,
            skipped: 0,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

fn lookup_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for key in parts {
        current = current.as_object()?.get(key)?;
    }
    match current {
        Value::Null => None,
        value => Some(value),
    }
}

impl RecordTransform for FieldExtractor {
    fn process(&mut self, mut record: Record, _destination_count: usize) -> Result<Decision> {
        self.total_processed += 1;

        let mut result = Record::new();
        for field in &self.fields {
            if let Some(value) = record.remove(field) {
                result.insert(field.clone(), value);
            } else if field.contains('.') {
                if let Some(value) = lookup_path(&record, field) {
                    result.insert(field.replace('.', "_"), value.clone());
                }
            }
        }

        if result.is_empty() {
            self.skipped += 1;
            return Ok(Decision::Drop);
        }

        self.extracted += 1;
        Ok(Decision::emit(result, 0))
    }

    fn current_stats(&self) -> StatsMap {
        let mut stats = StatsMap::new();
        stats.insert("total_processed", self.total_processed);
        stats.insert("extracted", self.extracted);
        stats.insert("skipped", self.skipped);
        stats
    }

    fn name(&self) -> &str {
        "field_extractor"
    }
}
