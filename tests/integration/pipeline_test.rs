//! Full runs over JSONL input with the built-in transforms.

use crate::common::{generate_scores_jsonl, read_jsonl, TestDir};
use bf_processor::Processor;
use serde_json::{json, Value};

fn ids(rows: &[Value]) -> Vec<u64> {
    rows.iter().map(|r| r["id"].as_u64().unwrap()).collect()
}

#[tokio::test]
async fn test_ordered_output_matches_input_order() {
    let dir = TestDir::new();
    dir.write("in.jsonl", generate_scores_jsonl(50));
    let config = dir
        .config("in.jsonl", &["out.jsonl"], "passthrough")
        .with_batch_size(10)
        .with_workers(2)
        .with_keep_order(true);

    let summary = Processor::new(config).run().await.unwrap();

    let rows = read_jsonl(&dir.path("out.jsonl"));
    assert_eq!(ids(&rows), (0..50).collect::<Vec<_>>());
    assert_eq!(rows[3], json!({"id": 3, "name": "user_3", "score": 21}));
    assert_eq!(summary.next_index, 50);
    assert_eq!(dir.stats()["total_output"], json!(50));
}

#[tokio::test]
async fn test_score_filter_splits_every_record() {
    let dir = TestDir::new();
    dir.write("in.jsonl", generate_scores_jsonl(100));
    let config = dir
        .config("in.jsonl", &["passed.jsonl", "failed.jsonl"], "score_filter")
        .with_batch_size(7)
        .with_workers(4);

    let summary = Processor::new(config).run().await.unwrap();

    let passed = read_jsonl(&dir.path("passed.jsonl"));
    let failed = read_jsonl(&dir.path("failed.jsonl"));
    assert_eq!(passed.len() + failed.len(), 100);
    assert!(passed.iter().all(|r| r["score"].as_u64().unwrap() >= 60));
    assert!(failed.iter().all(|r| r["score"].as_u64().unwrap() < 60));

    let mut all = ids(&passed);
    all.extend(ids(&failed));
    all.sort_unstable();
    assert_eq!(all, (0..100).collect::<Vec<_>>());

    let stats = dir.stats();
    assert_eq!(stats["total_processed"], json!(100));
    assert_eq!(stats["passed"], json!(passed.len()));
    assert_eq!(stats["failed"], json!(failed.len()));
    assert_eq!(summary.written_per_destination, vec![passed.len() as u64, failed.len() as u64]);
}

#[tokio::test]
async fn test_ordered_split_keeps_order_per_output() {
    let dir = TestDir::new();
    dir.write("in.jsonl", generate_scores_jsonl(200));
    let config = dir
        .config("in.jsonl", &["passed.jsonl", "failed.jsonl"], "score_filter")
        .with_batch_size(9)
        .with_workers(3)
        .with_keep_order(true);

    Processor::new(config).run().await.unwrap();

    for output in ["passed.jsonl", "failed.jsonl"] {
        let written = ids(&read_jsonl(&dir.path(output)));
        let mut sorted = written.clone();
        sorted.sort_unstable();
        assert_eq!(written, sorted, "{output} is out of order");
    }
}

#[tokio::test]
async fn test_text_length_filter_buckets() {
    let dir = TestDir::new();
    let lines: String = [5usize, 50, 150, 600, 2000]
        .iter()
        .enumerate()
        .map(|(i, len)| format!("{}\n", json!({"id": i, "text": "a".repeat(*len)})))
        .collect();
    dir.write("in.jsonl", lines);
    let config = dir
        .config("in.jsonl", &["short.jsonl", "medium.jsonl", "long.jsonl"], "text_length_filter")
        .with_workers(1);

    Processor::new(config).run().await.unwrap();

    assert_eq!(ids(&read_jsonl(&dir.path("short.jsonl"))), vec![1]);
    assert_eq!(ids(&read_jsonl(&dir.path("medium.jsonl"))), vec![2]);
    assert_eq!(ids(&read_jsonl(&dir.path("long.jsonl"))), vec![3]);
    assert_eq!(dir.stats()["total_processed"], json!(5));
}

#[tokio::test]
async fn test_data_enricher_adds_fields() {
    let dir = TestDir::new();
    dir.write("in.jsonl", "{\"a\": 1, \"b\": 2.5, \"c\": \"x\"}\n");
    let config = dir.config("in.jsonl", &["out.jsonl"], "data_enricher");

    Processor::new(config).run().await.unwrap();

    let rows = read_jsonl(&dir.path("out.jsonl"));
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["field_count"], json!(3));
    assert_eq!(row["numeric_sum"], json!(3.5));
    assert_eq!(row["content_hash"].as_str().unwrap().len(), 8);
    assert!(row["processed_at"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_empty_input_creates_empty_outputs() {
    let dir = TestDir::new();
    dir.write("in.jsonl", "");
    let config = dir.config("in.jsonl", &["a.jsonl", "b.jsonl"], "score_filter");

    let summary = Processor::new(config).run().await.unwrap();

    assert_eq!(summary.submitted, 0);
    assert_eq!(summary.next_index, 0);
    assert!(dir.path("a.jsonl").exists());
    assert!(read_jsonl(&dir.path("b.jsonl")).is_empty());
    assert_eq!(dir.stats()["total_processed"], json!(0));
}

#[tokio::test]
async fn test_non_numeric_scores_are_record_errors() {
    let dir = TestDir::new();
    dir.write(
        "in.jsonl",
        "{\"id\": 0, \"score\": 90}\n{\"id\": 1, \"score\": \"high\"}\n{\"id\": 2}\n",
    );
    let config = dir.config("in.jsonl", &["passed.jsonl", "failed.jsonl"], "score_filter");

    let summary = Processor::new(config).run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(summary.has_record_errors());
    assert_eq!(ids(&read_jsonl(&dir.path("passed.jsonl"))), vec![0]);
    // A missing score counts as zero
    assert_eq!(ids(&read_jsonl(&dir.path("failed.jsonl"))), vec![2]);
    assert_eq!(dir.stats()["total_failed"], json!(1));
}
