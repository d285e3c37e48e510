//! Arrow row to JSON record conversion.

use arrow::record_batch::RecordBatch;
use arrow_json::writer::{JsonArray, WriterBuilder};
use bf_error::{ReaderError, Result};
use bf_types::Record;

/// Converts every row of a RecordBatch into a JSON record.
///
/// Null columns are kept as explicit `null` fields so every record carries
/// the full schema. Temporal types are rendered as ISO 8601 strings.
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<Record>> {
    if batch.num_rows() == 0 {
        return Ok(Vec::new());
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::with_capacity(batch.get_array_memory_size()));

    writer
        .write(batch)
        .map_err(|e| ReaderError::Parse(format!("Failed to encode rows as JSON: {e}")))?;
    writer
        .finish()
        .map_err(|e| ReaderError::Parse(format!("Failed to encode rows as JSON: {e}")))?;

    let buffer = writer.into_inner();
    let records: Vec<Record> = serde_json::from_slice(&buffer)
        .map_err(|e| ReaderError::Parse(format!("Failed to decode encoded rows: {e}")))?;
    Ok(records)
}
