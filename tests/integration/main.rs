//! Integration tests for batchflow.
//!
//! Each test drives a complete run through [`bf_processor::Processor`]
//! against real files in a temporary directory.
//!
//! ```bash
//! cargo test -p integration-tests
//! ```

mod common;
mod formats_test;
mod pipeline_test;
mod resume_test;
mod script_test;
