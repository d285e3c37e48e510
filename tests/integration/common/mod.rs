//! Common utilities for integration tests.
//!
//! Test data generation and output readers shared by the suites.

pub mod fixtures;

pub use fixtures::{
    generate_scores_jsonl, generate_scores_parquet, generate_test_parquet, read_jsonl, read_parquet, write_gzip, TestDir,
};
