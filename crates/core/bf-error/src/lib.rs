//! Error types and classification for batchflow.
//!
//! This crate provides:
//! - [`BfError`] - Top-level error enum for all run errors
//! - Domain-specific errors ([`ReaderError`], [`TransformError`], [`SinkError`], [`CheckpointError`])
//! - [`ErrorCategory`] separating record-level errors from fatal ones
//! - Error classification logic based on error type and processing stage

use thiserror::Error;

/// Top-level error type for batchflow.
#[derive(Error, Debug)]
pub enum BfError {
    /// Reader errors (file access, decoding)
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    /// Transform errors (lookup, script execution, invalid output)
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Output sink errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Checkpoint persistence errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker pool failed to deliver a batch result
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// Run stopped by an external interrupt
    #[error("Interrupted")]
    Interrupted,

    /// Generic errors (wrapped anyhow)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reader-related errors.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),

    /// Access denied
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// File is corrupted or invalid
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    /// I/O error during read
    #[error("I/O error: {0}")]
    Io(String),

    /// Failed to decode a record or row group
    #[error("Parse error: {0}")]
    Parse(String),

    /// Decompression failed
    #[error("Decompression failed: {0}")]
    Decompression(String),
}

impl ReaderError {
    /// Maps an I/O error on `path` to the matching reader error.
    pub fn from_io(path: &str, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => ReaderError::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => ReaderError::AccessDenied(path.to_string()),
            _ => ReaderError::Io(format!("{path}: {error}")),
        }
    }
}

/// Transform-related errors.
#[derive(Error, Debug)]
pub enum TransformError {
    /// No transform registered under this name
    #[error("Unknown transform: {0}")]
    Unknown(String),

    /// Transform could not be constructed
    #[error("Failed to load transform: {0}")]
    Load(String),

    /// Script compilation failed
    #[error("Script compilation failed: {0}")]
    Compilation(String),

    /// Script or transform execution failed for one record
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Transform returned a value that is neither a record nor a drop
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// Destination selector outside the configured outputs
    #[error("Destination {destination} out of range (outputs: {count})")]
    InvalidDestination { destination: i64, count: usize },

    /// Transform panicked while processing a record
    #[error("Transform panicked: {0}")]
    Panicked(String),
}

/// Output sink errors.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Output file or directory could not be created
    #[error("Failed to create output {path}: {reason}")]
    Create { path: String, reason: String },

    /// Write to an open sink failed
    #[error("Write failed: {0}")]
    Write(String),

    /// Flushing buffered output failed
    #[error("Flush failed: {0}")]
    Flush(String),

    /// Record could not be encoded for the output format
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Write addressed to a sink that does not exist
    #[error("No output for destination {destination} (outputs: {count})")]
    InvalidDestination { destination: usize, count: usize },
}

/// Checkpoint persistence errors.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Checkpoint file exists but could not be read
    #[error("Read failed: {0}")]
    Read(String),

    /// Checkpoint file contents are not a non-negative integer
    #[error("Corrupt checkpoint: {0}")]
    Corrupt(String),

    /// Checkpoint could not be persisted
    #[error("Write failed: {0}")]
    Write(String),
}

/// Error classification for run control.
///
/// Record-level errors are absorbed by the worker pool; every other category
/// terminates the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// One record failed; logged, dropped, processing continues
    ///
    /// Examples: malformed input line, script error, invalid destination
    Record,

    /// A batch could not be processed or written; the run aborts
    ///
    /// Examples: worker pool shut down, output write failure
    Batch,

    /// Failure before any batch is dispatched
    ///
    /// Examples: missing input file, unknown transform, unwritable output directory
    Setup,

    /// External interrupt
    Interrupted,
}

impl ErrorCategory {
    /// Whether the error terminates the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Record)
    }

    /// Process exit code for this category.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Setup => 2,
            Self::Batch => 3,
            Self::Record => 4,
            Self::Interrupted => 130,
        }
    }
}

/// Processing stage for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Validating config, opening input and outputs, loading transforms
    Setup,

    /// Streaming records from the input
    Read,

    /// Applying the transform to a record
    Transform,

    /// Moving batches through the worker pool
    Dispatch,

    /// Writing to output sinks
    Write,

    /// Reading or writing the checkpoint
    Checkpoint,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "Setup"),
            Self::Read => write!(f, "Read"),
            Self::Transform => write!(f, "Transform"),
            Self::Dispatch => write!(f, "Dispatch"),
            Self::Write => write!(f, "Write"),
            Self::Checkpoint => write!(f, "Checkpoint"),
        }
    }
}

/// Classifies an error to determine whether the run can continue.
///
/// # Arguments
///
/// * `error` - The error to classify
/// * `stage` - The processing stage where the error occurred
pub fn classify_error(error: &BfError, stage: ProcessingStage) -> ErrorCategory {
    match error {
        BfError::Reader(e) => classify_reader_error(e, stage),
        BfError::Transform(e) => classify_transform_error(e),
        BfError::Sink(_) => fatal_for(stage),
        BfError::Checkpoint(e) => classify_checkpoint_error(e),
        BfError::Config(_) => ErrorCategory::Setup,
        BfError::Pool(_) => ErrorCategory::Batch,
        BfError::Interrupted => ErrorCategory::Interrupted,
        BfError::Other(_) => fatal_for(stage),
    }
}

fn fatal_for(stage: ProcessingStage) -> ErrorCategory {
    if matches!(stage, ProcessingStage::Setup) {
        ErrorCategory::Setup
    } else {
        ErrorCategory::Batch
    }
}

fn classify_reader_error(error: &ReaderError, stage: ProcessingStage) -> ErrorCategory {
    match error {
        ReaderError::NotFound(_) => ErrorCategory::Setup,
        ReaderError::AccessDenied(_) => ErrorCategory::Setup,
        ReaderError::Parse(_) => {
            // A single undecodable line is skipped; a corrupt row group is not
            if matches!(stage, ProcessingStage::Read) {
                ErrorCategory::Batch
            } else {
                ErrorCategory::Record
            }
        }
        ReaderError::InvalidFormat(_) | ReaderError::Io(_) | ReaderError::Decompression(_) => {
            fatal_for(stage)
        }
    }
}

fn classify_transform_error(error: &TransformError) -> ErrorCategory {
    match error {
        TransformError::Unknown(_) => ErrorCategory::Setup,
        TransformError::Load(_) => ErrorCategory::Setup,
        TransformError::Compilation(_) => ErrorCategory::Setup,
        TransformError::Execution(_) => ErrorCategory::Record,
        TransformError::InvalidOutput(_) => ErrorCategory::Record,
        TransformError::InvalidDestination { .. } => ErrorCategory::Record,
        TransformError::Panicked(_) => ErrorCategory::Record,
    }
}

fn classify_checkpoint_error(error: &CheckpointError) -> ErrorCategory {
    match error {
        CheckpointError::Read(_) => ErrorCategory::Record,
        CheckpointError::Corrupt(_) => ErrorCategory::Record,
        CheckpointError::Write(_) => ErrorCategory::Batch,
    }
}

/// Result type alias using BfError.
pub type Result<T> = std::result::Result<T, BfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification_reader_not_found() {
        let error = BfError::Reader(ReaderError::NotFound("input.jsonl".to_string()));
        assert_eq!(
            classify_error(&error, ProcessingStage::Setup),
            ErrorCategory::Setup
        );
    }

    #[test]
    fn test_error_classification_invalid_destination_is_record_level() {
        let error = BfError::Transform(TransformError::InvalidDestination {
            destination: 5,
            count: 2,
        });
        let category = classify_error(&error, ProcessingStage::Transform);
        assert_eq!(category, ErrorCategory::Record);
        assert!(!category.is_fatal());
    }

    #[test]
    fn test_error_classification_sink_by_stage() {
        let error = BfError::Sink(SinkError::Write("disk full".to_string()));
        assert_eq!(
            classify_error(&error, ProcessingStage::Write),
            ErrorCategory::Batch
        );

        let error = BfError::Sink(SinkError::Create {
            path: "/readonly/out.jsonl".to_string(),
            reason: "permission denied".to_string(),
        });
        assert_eq!(
            classify_error(&error, ProcessingStage::Setup),
            ErrorCategory::Setup
        );
    }

    #[test]
    fn test_error_classification_checkpoint() {
        let corrupt = BfError::Checkpoint(CheckpointError::Corrupt("abc".to_string()));
        assert!(!classify_error(&corrupt, ProcessingStage::Checkpoint).is_fatal());

        let write = BfError::Checkpoint(CheckpointError::Write("rename failed".to_string()));
        assert!(classify_error(&write, ProcessingStage::Checkpoint).is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ErrorCategory::Setup.exit_code(), 2);
        assert_eq!(ErrorCategory::Batch.exit_code(), 3);
        assert_eq!(ErrorCategory::Interrupted.exit_code(), 130);
        assert_eq!(
            classify_error(&BfError::Interrupted, ProcessingStage::Dispatch),
            ErrorCategory::Interrupted
        );
    }

    #[test]
    fn test_reader_error_from_io() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(
            ReaderError::from_io("a.jsonl", err),
            ReaderError::NotFound(p) if p == "a.jsonl"
        ));
    }

    #[test]
    fn test_error_display() {
        let error = BfError::Reader(ReaderError::NotFound("/data/input.jsonl".to_string()));
        assert!(error.to_string().contains("File not found"));

        let error = BfError::Transform(TransformError::InvalidDestination {
            destination: 3,
            count: 2,
        });
        assert_eq!(
            error.to_string(),
            "Transform error: Destination 3 out of range (outputs: 2)"
        );
    }

    #[test]
    fn test_processing_stage_display() {
        assert_eq!(ProcessingStage::Setup.to_string(), "Setup");
        assert_eq!(ProcessingStage::Checkpoint.to_string(), "Checkpoint");
    }
}
