//! Pipeline configuration
//!
//! One immutable [`PipelineConfig`] value is validated up front and passed
//! explicitly to every stage. Invalid selectors fail fast with
//! [`PipelineError::Configuration`] before any data is touched.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default training partition proportion for the stratified split.
pub const DEFAULT_TRAIN_PROPORTION: f64 = 0.667;

/// Default seed for the stratified split RNG.
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Bout identification strategy. Exactly one strategy is active per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "bout_type", rename_all = "snake_case")]
pub enum BoutStrategy {
    /// New bout whenever the marker column equals the configured value,
    /// scanning in original file order.
    Device {
        /// Name of the marker column in the raw file
        column_bout_id: String,
        /// Marker value that starts a new bout
        start_bout_id: String,
    },
    /// New bout whenever the time delta between consecutive samples of a
    /// device is missing or at least `time_threshold` seconds.
    TimeDiff {
        /// Gap threshold in seconds, must be positive
        time_threshold: f64,
    },
    /// Fixed windows of `bout_length` consecutive samples per device.
    Cont,
}

/// Which persisted model the apply flow loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    OwnModel,
    GriffonModel,
}

impl ModelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSource::OwnModel => "own_model",
            ModelSource::GriffonModel => "griffon_model",
        }
    }

    /// File name of the persisted model artifact.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            ModelSource::OwnModel => "own_model.json",
            ModelSource::GriffonModel => "griffon_model.json",
        }
    }

    /// Artifact path under a model directory.
    pub fn artifact_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(self.artifact_name())
    }
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Active bout identification strategy
    #[serde(flatten)]
    pub bout_strategy: BoutStrategy,
    /// Bout duration in seconds, must be positive
    pub bout_duration: f64,
    /// Accelerometer sampling frequency in Hz, must be positive
    pub acc_frequency: f64,
    /// Training partition proportion for the stratified split
    #[serde(default = "default_train_proportion")]
    pub train_proportion: f64,
    /// Seed for the stratified split RNG
    #[serde(default = "default_split_seed")]
    pub split_seed: u64,
    /// Persisted model selector, required by the inference flow
    #[serde(default)]
    pub rf_model: Option<ModelSource>,
}

fn default_train_proportion() -> f64 {
    DEFAULT_TRAIN_PROPORTION
}

fn default_split_seed() -> u64 {
    DEFAULT_SPLIT_SEED
}

impl PipelineConfig {
    /// Parse and validate a configuration from JSON. Unknown `bout_type` or
    /// `rf_model` selectors are rejected here, before any row is processed.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_json::from_str(json)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate numeric parameters and strategy settings.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.bout_duration <= 0.0 {
            return Err(PipelineError::Configuration(format!(
                "bout_duration must be positive, got {}",
                self.bout_duration
            )));
        }
        if self.acc_frequency <= 0.0 {
            return Err(PipelineError::Configuration(format!(
                "acc_frequency must be positive, got {}",
                self.acc_frequency
            )));
        }
        if self.train_proportion <= 0.0 || self.train_proportion >= 1.0 {
            return Err(PipelineError::Configuration(format!(
                "train_proportion must be in (0, 1), got {}",
                self.train_proportion
            )));
        }
        match &self.bout_strategy {
            BoutStrategy::Device {
                column_bout_id,
                start_bout_id,
            } => {
                if column_bout_id.is_empty() || start_bout_id.is_empty() {
                    return Err(PipelineError::Configuration(
                        "device strategy requires column_bout_id and start_bout_id".to_string(),
                    ));
                }
            }
            BoutStrategy::TimeDiff { time_threshold } => {
                if *time_threshold <= 0.0 {
                    return Err(PipelineError::Configuration(format!(
                        "time_threshold must be positive, got {}",
                        time_threshold
                    )));
                }
            }
            BoutStrategy::Cont => {}
        }
        Ok(())
    }

    /// Expected number of samples per bout.
    pub fn bout_length(&self) -> usize {
        (self.bout_duration * self.acc_frequency).round() as usize
    }

    /// Name of the marker column to read from raw files.
    pub fn marker_column(&self) -> &str {
        match &self.bout_strategy {
            BoutStrategy::Device { column_bout_id, .. } => column_bout_id,
            _ => "datatype",
        }
    }
}
