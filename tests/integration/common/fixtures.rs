//! Input generators, output readers and a scratch directory.

use bf_reader_parquet::ParquetSource;
use bf_traits::RecordSource;
use bf_types::{Record, RunConfig, SourceItem};
use futures::StreamExt;
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// A scratch directory holding one run's input, outputs and stats.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    /// A run of `transform` from `input` to `outputs`, stats in `stats.json`.
    pub fn config(&self, input: &str, outputs: &[&str], transform: &str) -> RunConfig {
        RunConfig::new(
            self.path(input),
            outputs.iter().map(|o| self.path(o)).collect(),
            self.path("stats.json"),
            transform,
        )
    }

    pub fn stats(&self) -> Value {
        let text = std::fs::read_to_string(self.path("stats.json")).expect("stats file missing");
        serde_json::from_str(&text).expect("stats file is not JSON")
    }
}

/// `{"id": i, "name": "user_i", "score": (i * 7) % 100}` per line.
pub fn generate_scores_jsonl(num_records: usize) -> String {
    let mut out = String::new();
    for i in 0..num_records {
        let line = json!({
            "id": i,
            "name": format!("user_{i}"),
            "score": (i * 7) % 100,
        });
        out.push_str(&line.to_string());
        out.push('\n');
    }
    out
}

/// Parquet with `id`, `name`, `value` and `extra` columns.
pub fn generate_test_parquet(num_records: usize) -> Vec<u8> {
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::io::Cursor;
    use std::sync::Arc;

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("value", DataType::Float64, false),
        Field::new("extra", DataType::Utf8, false),
    ]));

    let ids: Vec<i64> = (0..num_records as i64).collect();
    let names: Vec<String> = (0..num_records).map(|i| format!("user_{i}")).collect();
    let values: Vec<f64> = (0..num_records).map(|i| i as f64 * 1.5).collect();
    let extras: Vec<String> = (0..num_records).map(|i| format!("x{i}")).collect();

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(names)),
            Arc::new(Float64Array::from(values)),
            Arc::new(StringArray::from(extras)),
        ],
    )
    .expect("Failed to create record batch");

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            ArrowWriter::try_new(&mut cursor, schema, None).expect("Failed to create parquet writer");
        writer.write(&batch).expect("Failed to write batch");
        writer.close().expect("Failed to close writer");
    }

    cursor.into_inner()
}

/// Parquet with `id` and `score` columns, one row per score.
pub fn generate_scores_parquet(scores: &[i64]) -> Vec<u8> {
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("score", DataType::Int64, false),
    ]));
    let ids: Vec<i64> = (0..scores.len() as i64).collect();

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(Int64Array::from(scores.to_vec())),
        ],
    )
    .expect("Failed to create record batch");

    let mut out = Vec::new();
    {
        let mut writer =
            ArrowWriter::try_new(&mut out, schema, None).expect("Failed to create parquet writer");
        writer.write(&batch).expect("Failed to write batch");
        writer.close().expect("Failed to close writer");
    }
    out
}

/// Gzip-compresses `data`.
pub fn write_gzip(data: &str) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.as_bytes()).expect("Failed to compress");
    encoder.finish().expect("Failed to finish gzip stream")
}

/// Every line of a JSONL output; a missing file reads as empty.
pub fn read_jsonl(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).expect("output line is not JSON"))
        .collect()
}

/// Every row of a Parquet output.
pub async fn read_parquet(path: &Path) -> Vec<Record> {
    let mut stream = ParquetSource::new(path)
        .open(0)
        .await
        .expect("Failed to open parquet output");
    let mut rows = Vec::new();
    while let Some(item) = stream.next().await {
        if let SourceItem::Record(r) = item.expect("Failed to read parquet row") {
            rows.push(r.record);
        }
    }
    rows
}
