//! Error types for the accflow pipeline

use thiserror::Error;

/// Errors that can occur while building or applying a classification pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Data integrity error: {0}")]
    Integrity(String),

    #[error("Failed to parse timestamp: {0}")]
    TimestampParse(String),

    #[error("Missing column in input file: {0}")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
