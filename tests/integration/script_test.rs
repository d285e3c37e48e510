//! Runs driven by a Rhai script file.

use crate::common::{generate_scores_jsonl, read_jsonl, TestDir};
use bf_error::ErrorCategory;
use bf_processor::Processor;
use serde_json::json;

const ROUTING_SCRIPT: &str = r#"
stats.seen = (stats.seen ?? 0) + 1;

if record.score >= 50 {
    record.band = "high";
    stats.high = (stats.high ?? 0) + 1;
    [record, 0]
} else if record.score >= 10 {
    record.band = "low";
    [record, 1]
} else {
    ()
}
"#;

#[tokio::test]
async fn test_script_routes_and_counts() {
    let dir = TestDir::new();
    dir.write("in.jsonl", generate_scores_jsonl(100));
    let script = dir.write("route.rhai", ROUTING_SCRIPT);
    let config = dir
        .config("in.jsonl", &["high.jsonl", "low.jsonl"], "rhai")
        .with_script_path(script)
        .with_batch_size(12)
        .with_workers(3);

    let summary = Processor::new(config).run().await.unwrap();

    let high = read_jsonl(&dir.path("high.jsonl"));
    let low = read_jsonl(&dir.path("low.jsonl"));
    assert!(high.iter().all(|r| r["band"] == json!("high")));
    assert!(low.iter().all(|r| r["band"] == json!("low")));

    // Scores are (i * 7) % 100, a permutation of 0..100
    assert_eq!(high.len(), 50);
    assert_eq!(low.len(), 40);
    assert_eq!(summary.written, 90);

    let stats = dir.stats();
    assert_eq!(stats["seen"], json!(100));
    assert_eq!(stats["high"], json!(50));
}

#[tokio::test]
async fn test_script_runtime_errors_drop_records() {
    let dir = TestDir::new();
    dir.write("in.jsonl", "{\"n\": 4}\n{\"n\": 0}\n{\"n\": 2}\n");
    let script = dir.write("divide.rhai", "record.q = 8 / record.n; record");
    let config = dir
        .config("in.jsonl", &["out.jsonl"], "rhai")
        .with_script_path(script)
        .with_keep_order(true);

    let summary = Processor::new(config).run().await.unwrap();

    let rows = read_jsonl(&dir.path("out.jsonl"));
    assert_eq!(rows.iter().map(|r| r["q"].clone()).collect::<Vec<_>>(), vec![json!(2), json!(4)]);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_script_compile_error_is_setup_failure() {
    let dir = TestDir::new();
    dir.write("in.jsonl", generate_scores_jsonl(3));
    let script = dir.write("broken.rhai", "if record.score > { ");
    let config = dir
        .config("in.jsonl", &["out.jsonl"], "rhai")
        .with_script_path(script);

    let failure = Processor::new(config).run().await.unwrap_err();

    assert_eq!(failure.category(), ErrorCategory::Setup);
    assert!(failure.summary.is_none());
    assert!(!dir.path("out.jsonl").exists());
}
