//! Core types for the accflow pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw samples, calibration records, segmented samples, per-bout
//! feature vectors, assembled examples, and classification results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One raw accelerometer reading as it appears in the input files.
///
/// Samples are ordered by (device_id, timestamp) for the time-based
/// segmentation strategies; the device-marker strategy consumes them in
/// original file order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSample {
    /// Device (tag) identifier
    pub device_id: String,
    /// Sample time (UTC, second resolution)
    pub timestamp: DateTime<Utc>,
    /// Datatype/marker column carried through from the raw file
    pub marker: String,
    /// Acceleration, x axis (raw counts before calibration, g after)
    pub acc_x: f64,
    /// Acceleration, y axis
    pub acc_y: f64,
    /// Acceleration, z axis
    pub acc_z: f64,
    /// Observed behavior label, when a field observation matched this sample
    pub behavior: Option<String>,
}

/// A ground-truth behavior observation, joined to raw samples by exact
/// (device_id, timestamp) match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub observed_behavior: String,
}

/// Per-device linear calibration coefficients mapping raw counts to
/// acceleration. Any missing coefficient is imputed with the mean of the
/// known coefficients for that axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub device_id: String,
    pub slope_x: Option<f64>,
    pub intercept_x: Option<f64>,
    pub slope_y: Option<f64>,
    pub intercept_y: Option<f64>,
    pub slope_z: Option<f64>,
    pub intercept_z: Option<f64>,
}

/// A calibrated sample with its assigned bout identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentedSample {
    pub sample: RawSample,
    /// Monotonically non-decreasing bout identifier. Bout 0 holds samples
    /// seen before the first bout boundary and is always filtered out.
    pub bout_id: u64,
}

/// Per-axis statistics over one bout (11 stored scalars per axis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisStats {
    pub mean: f64,
    /// Sample standard deviation (n - 1 divisor)
    pub sd: f64,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    pub max: f64,
    pub min: f64,
    /// Euclidean norm over the bout, sqrt(sum of squares)
    pub norm: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    /// Mean oscillation magnitude between successive local extrema.
    /// NaN when the bout has fewer than two extrema.
    pub mean_amplitude: f64,
}

impl AxisStats {
    /// Range (max - min). Derivable, so not stored as its own column.
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// Pairwise statistics between two axes over one bout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairStats {
    /// Sample covariance (n - 1 divisor)
    pub covariance: f64,
    /// Pearson correlation coefficient
    pub correlation: f64,
    /// Mean of elementwise differences
    pub diff_mean: f64,
    /// Sample standard deviation of elementwise differences
    pub diff_sd: f64,
}

/// Number of scalar features per bout: 11 per axis plus 4 per axis pair.
pub const FEATURE_COUNT: usize = 45;

/// The fixed-length statistical feature vector for one bout.
/// Immutable once computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub device_id: String,
    pub bout_id: u64,
    pub x: AxisStats,
    pub y: AxisStats,
    pub z: AxisStats,
    pub xy: PairStats,
    pub xz: PairStats,
    pub yz: PairStats,
}

impl FeatureVector {
    /// The 45 feature values in the canonical column order.
    pub fn values(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(FEATURE_COUNT);
        for axis in [&self.x, &self.y, &self.z] {
            out.extend_from_slice(&[
                axis.mean,
                axis.sd,
                axis.skewness,
                axis.kurtosis,
                axis.max,
                axis.min,
                axis.norm,
                axis.q25,
                axis.q50,
                axis.q75,
                axis.mean_amplitude,
            ]);
        }
        for pair in [&self.xy, &self.xz, &self.yz] {
            out.extend_from_slice(&[
                pair.covariance,
                pair.correlation,
                pair.diff_mean,
                pair.diff_sd,
            ]);
        }
        out
    }

    /// Column names matching [`FeatureVector::values`].
    pub fn column_names() -> Vec<String> {
        let axis_stats = [
            "mean",
            "sd",
            "skewness",
            "kurtosis",
            "max",
            "min",
            "norm",
            "q25",
            "q50",
            "q75",
            "mean_amplitude",
        ];
        let pair_stats = ["cov", "corr", "diff_mean", "diff_sd"];

        let mut names = Vec::with_capacity(FEATURE_COUNT);
        for axis in ["x", "y", "z"] {
            for stat in axis_stats {
                names.push(format!("{}_{}", axis, stat));
            }
        }
        for pair in ["xy", "xz", "yz"] {
            for stat in pair_stats {
                names.push(format!("{}_{}", pair, stat));
            }
        }
        names
    }
}

/// One assembled wide-format row: a bout's ordered samples reshaped into
/// per-axis columns, merged with its feature vector.
///
/// The label is present after propagation when every sample in the bout
/// carried the same behavior; otherwise the bout is unlabeled and training
/// consumers exclude it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub device_id: String,
    pub bout_id: u64,
    /// Timestamp of the bout's first sample
    pub start_time: DateTime<Utc>,
    /// Ordered within-bout samples, one vector per axis, each of length
    /// `bout_length`
    pub samples_x: Vec<f64>,
    pub samples_y: Vec<f64>,
    pub samples_z: Vec<f64>,
    pub features: FeatureVector,
    pub label: Option<String>,
}

impl Example {
    /// Convert into a labeled example, or None when the bout is unlabeled.
    pub fn into_labeled(self) -> Option<LabeledExample> {
        match self.label.clone() {
            Some(label) => Some(LabeledExample {
                example: self,
                label,
            }),
            None => None,
        }
    }
}

/// An example with its ground-truth label, as consumed by training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledExample {
    pub example: Example,
    pub label: String,
}

/// Prediction output for one example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predicted_label: String,
    /// Per-class probability, keyed by class name; values sum to 1
    pub probabilities: BTreeMap<String, f64>,
    /// Maximum class probability, in [0, 1]
    pub confidence: f64,
}

/// An example together with its classification result, keyed by the
/// example's (device_id, bout_id) identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredExample {
    pub example: Example,
    pub result: ClassificationResult,
}
