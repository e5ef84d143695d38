//! accflow - bout segmentation and feature pipeline for tri-axial
//! accelerometer behavior classification
//!
//! accflow converts raw, device-tagged accelerometer streams into
//! fixed-length labeled feature vectors for a classifier, and applies a
//! trained classifier to new streams with a confidence score per prediction:
//! calibration → bout segmentation → label propagation → integrity filter →
//! feature extraction → wide-format assembly → (split →) classification →
//! confidence scoring.
//!
//! ## Modules
//!
//! - **Training flow**: build a stratified train/test set from observed
//!   behavior and fit a classifier through the adapter trait
//! - **Inference flow**: segment a new stream, classify each bout and score
//!   the prediction

pub mod calibration;
pub mod classifier;
pub mod config;
pub mod confidence;
pub mod error;
pub mod features;
pub mod filter;
pub mod io;
pub mod labels;
pub mod pipeline;
pub mod segmenter;
pub mod splitter;
pub mod types;
pub mod wide;

pub use classifier::{CentroidClassifier, Classifier, ModelArtifact};
pub use config::{BoutStrategy, ModelSource, PipelineConfig};
pub use error::PipelineError;
pub use pipeline::{BoutPipeline, PipelineSummary, TrainingSet};
pub use types::{
    CalibrationRecord, ClassificationResult, Example, FeatureVector, LabeledExample, Observation,
    RawSample, ScoredExample, FEATURE_COUNT,
};

/// Crate version embedded in run summaries and model artifacts
pub const ACCFLOW_VERSION: &str = env!("CARGO_PKG_VERSION");
