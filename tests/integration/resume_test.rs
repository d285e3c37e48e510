//! Checkpointing and resuming across runs.

use crate::common::{generate_scores_jsonl, read_jsonl, TestDir};
use bf_error::{ErrorCategory, Result};
use bf_processor::Processor;
use bf_traits::RecordTransform;
use bf_transform::TransformRegistry;
use bf_types::{Decision, Record, StatsMap};
use serde_json::{json, Value};
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;

fn ids(rows: &[Value]) -> Vec<u64> {
    rows.iter().map(|r| r["id"].as_u64().unwrap()).collect()
}

fn checkpoint(dir: &TestDir) -> u64 {
    std::fs::read_to_string(dir.path("out.jsonl.checkpoint"))
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_resume_reproduces_uninterrupted_output() {
    let input = generate_scores_jsonl(120);

    let full = TestDir::new();
    full.write("in.jsonl", &input);
    let config = full
        .config("in.jsonl", &["out.jsonl"], "score_filter")
        .with_batch_size(8)
        .with_workers(3)
        .with_keep_order(true);
    Processor::new(config).run().await.unwrap();
    let expected = read_jsonl(&full.path("out.jsonl"));

    // A run that stopped after 40 records, with only those written
    let partial = TestDir::new();
    partial.write("in.jsonl", &input);
    let prefix: String = expected
        .iter()
        .filter(|r| r["id"].as_u64().unwrap() < 40)
        .map(|r| format!("{r}\n"))
        .collect();
    partial.write("out.jsonl", prefix);
    partial.write("out.jsonl.checkpoint", "40");

    let config = partial
        .config("in.jsonl", &["out.jsonl"], "score_filter")
        .with_batch_size(8)
        .with_workers(3)
        .with_keep_order(true);
    let summary = Processor::new(config).run().await.unwrap();

    assert_eq!(summary.start_index, 40);
    assert_eq!(summary.submitted, 80);
    assert_eq!(summary.next_index, 120);

    assert_eq!(read_jsonl(&partial.path("out.jsonl")), expected);
    assert_eq!(checkpoint(&partial), 120);
}

#[tokio::test]
async fn test_rerun_after_completion_does_nothing() {
    let dir = TestDir::new();
    dir.write("in.jsonl", generate_scores_jsonl(30));
    let config = dir
        .config("in.jsonl", &["out.jsonl"], "passthrough")
        .with_batch_size(4);

    Processor::new(config.clone()).run().await.unwrap();
    let first = std::fs::read_to_string(dir.path("out.jsonl")).unwrap();

    let summary = Processor::new(config).run().await.unwrap();

    assert_eq!(summary.start_index, 30);
    assert_eq!(summary.submitted, 0);
    assert_eq!(std::fs::read_to_string(dir.path("out.jsonl")).unwrap(), first);
    assert_eq!(dir.stats()["total_processed"], json!(0));
}

static STOP: OnceLock<CancellationToken> = OnceLock::new();

/// Passes records through, cancelling the run when it sees id 500.
struct StopAt500;

impl RecordTransform for StopAt500 {
    fn process(&mut self, record: Record, _destination_count: usize) -> Result<Decision> {
        if record.get("id") == Some(&json!(500)) {
            if let Some(token) = STOP.get() {
                token.cancel();
            }
        }
        Ok(Decision::emit(record, 0))
    }

    fn current_stats(&self) -> StatsMap {
        StatsMap::new()
    }
}

#[tokio::test]
async fn test_interrupted_run_resumes_to_completion() {
    let token = STOP.get_or_init(CancellationToken::new).clone();
    let mut registry = TransformRegistry::empty();
    registry.register("stop_at_500", |_| Ok(Box::new(StopAt500)));

    let dir = TestDir::new();
    dir.write("in.jsonl", generate_scores_jsonl(5000));
    let config = dir
        .config("in.jsonl", &["out.jsonl"], "stop_at_500")
        .with_batch_size(10)
        .with_workers(2)
        .with_keep_order(true);

    let failure = Processor::new(config)
        .with_registry(registry)
        .with_cancellation(token)
        .run()
        .await
        .unwrap_err();

    assert_eq!(failure.category(), ErrorCategory::Interrupted);
    let summary = failure.summary.expect("interrupted runs carry a summary");
    assert!(summary.next_index >= 510);
    assert!(summary.next_index < 5000);
    assert_eq!(checkpoint(&dir), summary.next_index);
    assert_eq!(
        ids(&read_jsonl(&dir.path("out.jsonl"))),
        (0..summary.next_index).collect::<Vec<_>>()
    );

    let config = dir
        .config("in.jsonl", &["out.jsonl"], "passthrough")
        .with_batch_size(10)
        .with_workers(2)
        .with_keep_order(true);
    let resumed = Processor::new(config).run().await.unwrap();

    assert_eq!(resumed.start_index, summary.next_index);
    assert_eq!(resumed.next_index, 5000);
    assert_eq!(
        ids(&read_jsonl(&dir.path("out.jsonl"))),
        (0..5000).collect::<Vec<_>>()
    );
}
