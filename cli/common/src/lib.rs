//! Shared utilities for batchflow CLI binaries.

pub mod args;
pub mod format;
pub mod logging;

pub use args::{parse_positive_usize, LogLevel};
pub use format::{format_duration, format_number, format_rate};
pub use logging::{init_logging, log_file_path};
