//! Parquet and compressed inputs.

use crate::common::{
    generate_scores_jsonl, generate_scores_parquet, generate_test_parquet, read_jsonl, read_parquet,
    write_gzip, TestDir,
};
use bf_processor::Processor;
use bf_types::FileFormat;
use serde_json::json;

#[tokio::test]
async fn test_parquet_field_extraction() {
    let dir = TestDir::new();
    dir.write("in.parquet", generate_test_parquet(250));
    let config = dir
        .config("in.parquet", &["out.parquet"], "field_extractor")
        .with_batch_size(32)
        .with_workers(2)
        .with_keep_order(true);

    let summary = Processor::new(config).run().await.unwrap();
    assert_eq!(summary.written, 250);

    let rows = read_parquet(&dir.path("out.parquet")).await;
    assert_eq!(rows.len(), 250);
    let row = &rows[10];
    assert_eq!(row["id"], json!(10));
    assert_eq!(row["name"], json!("user_10"));
    assert_eq!(row["value"], json!(15.0));
    assert!(!row.contains_key("extra"));

    assert_eq!(
        std::fs::read_to_string(dir.path("out.parquet.checkpoint")).unwrap(),
        "250"
    );
}

#[tokio::test]
async fn test_parquet_rerun_keeps_existing_rows() {
    let dir = TestDir::new();
    dir.write("in.parquet", generate_test_parquet(40));
    let config = dir.config("in.parquet", &["out.parquet"], "passthrough");

    Processor::new(config.clone()).run().await.unwrap();
    let summary = Processor::new(config).run().await.unwrap();

    assert_eq!(summary.submitted, 0);
    assert_eq!(read_parquet(&dir.path("out.parquet")).await.len(), 40);
}

#[tokio::test]
async fn test_fresh_run_replaces_parquet_output_that_gets_no_rows() {
    let dir = TestDir::new();
    dir.write("mixed.parquet", generate_scores_parquet(&[95, 40, 72, 10]));
    dir.write("all_pass.parquet", generate_scores_parquet(&[88, 91, 65]));

    let first = dir.config("mixed.parquet", &["passed.parquet", "failed.parquet"], "score_filter");
    Processor::new(first).run().await.unwrap();
    assert_eq!(read_parquet(&dir.path("failed.parquet")).await.len(), 2);

    let second = dir
        .config("all_pass.parquet", &["passed.parquet", "failed.parquet"], "score_filter")
        .with_resume(false);
    let summary = Processor::new(second).run().await.unwrap();

    assert_eq!(summary.written_per_destination, vec![3, 0]);
    assert_eq!(read_parquet(&dir.path("passed.parquet")).await.len(), 3);
    assert!(!dir.path("failed.parquet").exists());
}

#[tokio::test]
async fn test_explicit_format_overrides_extension() {
    let dir = TestDir::new();
    dir.write("in.data", generate_test_parquet(5));
    let config = dir
        .config("in.data", &["out.data"], "passthrough")
        .with_format(FileFormat::Parquet);

    Processor::new(config).run().await.unwrap();

    assert_eq!(read_parquet(&dir.path("out.data")).await.len(), 5);
}

#[tokio::test]
async fn test_gzip_jsonl_input() {
    let dir = TestDir::new();
    dir.write("in.jsonl.gz", write_gzip(&generate_scores_jsonl(64)));
    let config = dir
        .config("in.jsonl.gz", &["out.jsonl"], "passthrough")
        .with_batch_size(16)
        .with_keep_order(true);

    let summary = Processor::new(config).run().await.unwrap();

    let rows = read_jsonl(&dir.path("out.jsonl"));
    assert_eq!(summary.written, 64);
    assert_eq!(rows.len(), 64);
    assert_eq!(rows[63]["name"], json!("user_63"));
}
