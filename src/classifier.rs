//! Classifier adapter
//!
//! The pipeline does not implement the learning algorithm. It supplies
//! feature rows to an interchangeable [`Classifier`] and consumes its two
//! prediction entry points. Only the 45 statistical features reach the
//! model; wide per-sample columns and device identifiers never do.
//!
//! Persisted models travel as a JSON envelope ([`ModelArtifact`]) whose
//! payload is opaque to the pipeline.

use crate::confidence::{max_probability, ClassProbabilities};
use crate::error::PipelineError;
use crate::types::{ClassificationResult, Example, LabeledExample, ScoredExample, FEATURE_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// Abstract capability of the external model.
pub trait Classifier {
    /// Train on feature rows and their labels.
    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<(), PipelineError>;

    /// Predicted class label per feature row.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<String>, PipelineError>;

    /// Per-class probability vector per feature row.
    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<ClassProbabilities>, PipelineError>;

    /// Class labels known to the trained model.
    fn classes(&self) -> Vec<String>;

    /// Serialize the model's internal state to an opaque payload.
    fn export_payload(&self) -> Result<serde_json::Value, PipelineError>;

    /// Restore the model's internal state from an opaque payload.
    fn import_payload(&mut self, payload: &serde_json::Value) -> Result<(), PipelineError>;
}

/// Serialized model envelope. The payload's structure belongs to the
/// concrete classifier; the pipeline only reads the metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    /// Version of the crate that produced the artifact
    pub producer_version: String,
    pub classes: Vec<String>,
    pub payload: serde_json::Value,
}

impl ModelArtifact {
    /// Capture a trained classifier into an artifact.
    pub fn capture(classifier: &dyn Classifier) -> Result<Self, PipelineError> {
        Ok(Self {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            producer_version: crate::ACCFLOW_VERSION.to_string(),
            classes: classifier.classes(),
            payload: classifier.export_payload()?,
        })
    }

    /// Restore a classifier's state from this artifact.
    pub fn restore(&self, classifier: &mut dyn Classifier) -> Result<(), PipelineError> {
        classifier.import_payload(&self.payload)
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// Feature rows for the model: the 45 statistics only.
fn feature_rows(examples: &[Example]) -> Vec<Vec<f64>> {
    examples.iter().map(|e| e.features.values()).collect()
}

/// Train the classifier on labeled examples. An empty training set is
/// rejected here; everything else is the concrete classifier's business.
pub fn fit_classifier(
    classifier: &mut dyn Classifier,
    examples: &[LabeledExample],
) -> Result<(), PipelineError> {
    if examples.is_empty() {
        return Err(PipelineError::Model(
            "cannot train on an empty example set".to_string(),
        ));
    }
    let rows: Vec<Vec<f64>> = examples.iter().map(|e| e.example.features.values()).collect();
    let labels: Vec<String> = examples.iter().map(|e| e.label.clone()).collect();
    classifier.fit(&rows, &labels)
}

/// Classify examples: predicted label from `predict`, probabilities from
/// `predict_proba`, confidence as the maximum class probability.
pub fn classify_examples(
    classifier: &dyn Classifier,
    examples: Vec<Example>,
) -> Result<Vec<ScoredExample>, PipelineError> {
    let rows = feature_rows(&examples);
    let labels = classifier.predict(&rows)?;
    let probabilities = classifier.predict_proba(&rows)?;

    if labels.len() != examples.len() || probabilities.len() != examples.len() {
        return Err(PipelineError::Model(format!(
            "classifier returned {} labels / {} probability vectors for {} examples",
            labels.len(),
            probabilities.len(),
            examples.len()
        )));
    }

    examples
        .into_iter()
        .zip(labels)
        .zip(probabilities)
        .map(|((example, predicted_label), probabilities)| {
            let (_, confidence) = max_probability(&probabilities)?;
            Ok(ScoredExample {
                example,
                result: ClassificationResult {
                    predicted_label,
                    probabilities,
                    confidence,
                },
            })
        })
        .collect()
}

/// Nearest-centroid reference classifier.
///
/// Stores one mean feature vector per class and scores by inverse distance.
/// This is the crate's built-in stand-in; an ensemble model plugs in through
/// the same [`Classifier`] trait.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CentroidClassifier {
    centroids: BTreeMap<String, Vec<f64>>,
}

impl CentroidClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn nearest(&self, row: &[f64]) -> Result<Vec<(String, f64)>, PipelineError> {
        if self.centroids.is_empty() {
            return Err(PipelineError::Model(
                "classifier has not been trained".to_string(),
            ));
        }
        Ok(self
            .centroids
            .iter()
            .map(|(class, centroid)| (class.clone(), distance(row, centroid)))
            .collect())
    }
}

/// Euclidean distance over the dimensions finite in both vectors.
/// Mean-amplitude features can be NaN for extrema-free bouts.
fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

impl Classifier for CentroidClassifier {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> Result<(), PipelineError> {
        if features.is_empty() || features.len() != labels.len() {
            return Err(PipelineError::Model(format!(
                "mismatched training input: {} rows, {} labels",
                features.len(),
                labels.len()
            )));
        }
        for row in features {
            if row.len() != FEATURE_COUNT {
                return Err(PipelineError::Model(format!(
                    "feature row has {} values, expected {}",
                    row.len(),
                    FEATURE_COUNT
                )));
            }
        }

        let mut sums: BTreeMap<String, (Vec<f64>, Vec<usize>)> = BTreeMap::new();
        for (row, label) in features.iter().zip(labels) {
            let (sum, count) = sums
                .entry(label.clone())
                .or_insert_with(|| (vec![0.0; FEATURE_COUNT], vec![0; FEATURE_COUNT]));
            for (i, value) in row.iter().enumerate() {
                if value.is_finite() {
                    sum[i] += value;
                    count[i] += 1;
                }
            }
        }

        self.centroids = sums
            .into_iter()
            .map(|(label, (sum, count))| {
                let centroid = sum
                    .iter()
                    .zip(&count)
                    .map(|(s, c)| if *c > 0 { s / *c as f64 } else { f64::NAN })
                    .collect();
                (label, centroid)
            })
            .collect();
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<String>, PipelineError> {
        features
            .iter()
            .map(|row| {
                let distances = self.nearest(row)?;
                distances
                    .into_iter()
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(class, _)| class)
                    .ok_or_else(|| PipelineError::Model("no classes available".to_string()))
            })
            .collect()
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<ClassProbabilities>, PipelineError> {
        features
            .iter()
            .map(|row| {
                let distances = self.nearest(row)?;
                let weights: Vec<(String, f64)> = distances
                    .into_iter()
                    .map(|(class, d)| (class, 1.0 / (d + 1e-9)))
                    .collect();
                let total: f64 = weights.iter().map(|(_, w)| w).sum();
                Ok(weights
                    .into_iter()
                    .map(|(class, w)| (class, w / total))
                    .collect())
            })
            .collect()
    }

    fn classes(&self) -> Vec<String> {
        self.centroids.keys().cloned().collect()
    }

    fn export_payload(&self) -> Result<serde_json::Value, PipelineError> {
        Ok(serde_json::to_value(self)?)
    }

    fn import_payload(&mut self, payload: &serde_json::Value) -> Result<(), PipelineError> {
        *self = serde_json::from_value(payload.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_row(value: f64) -> Vec<f64> {
        vec![value; FEATURE_COUNT]
    }

    #[test]
    fn test_centroid_classifier_separates_classes() {
        let mut classifier = CentroidClassifier::new();
        classifier
            .fit(
                &[make_row(0.0), make_row(0.1), make_row(10.0), make_row(9.9)],
                &[
                    "resting".to_string(),
                    "resting".to_string(),
                    "flapping".to_string(),
                    "flapping".to_string(),
                ],
            )
            .unwrap();

        let labels = classifier.predict(&[make_row(0.2), make_row(9.5)]).unwrap();
        assert_eq!(labels, vec!["resting".to_string(), "flapping".to_string()]);

        let probabilities = classifier.predict_proba(&[make_row(0.2)]).unwrap();
        let sum: f64 = probabilities[0].values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(probabilities[0]["resting"] > probabilities[0]["flapping"]);
    }

    #[test]
    fn test_predict_before_fit_is_model_error() {
        let classifier = CentroidClassifier::new();
        let err = classifier.predict(&[make_row(0.0)]).unwrap_err();
        assert!(matches!(err, PipelineError::Model(_)));
    }

    #[test]
    fn test_wrong_row_width_is_model_error() {
        let mut classifier = CentroidClassifier::new();
        let err = classifier
            .fit(&[vec![1.0, 2.0]], &["resting".to_string()])
            .unwrap_err();
        assert!(matches!(err, PipelineError::Model(_)));
    }

    #[test]
    fn test_nan_features_do_not_poison_training() {
        let mut classifier = CentroidClassifier::new();
        let mut row = make_row(1.0);
        row[10] = f64::NAN;
        classifier
            .fit(
                &[row, make_row(5.0)],
                &["a".to_string(), "b".to_string()],
            )
            .unwrap();

        let labels = classifier.predict(&[make_row(1.1)]).unwrap();
        assert_eq!(labels, vec!["a".to_string()]);
    }

    #[test]
    fn test_artifact_round_trip() {
        let mut classifier = CentroidClassifier::new();
        classifier
            .fit(
                &[make_row(0.0), make_row(10.0)],
                &["a".to_string(), "b".to_string()],
            )
            .unwrap();

        let artifact = ModelArtifact::capture(&classifier).unwrap();
        assert_eq!(artifact.classes, vec!["a".to_string(), "b".to_string()]);

        let json = artifact.to_json().unwrap();
        let restored_artifact = ModelArtifact::from_json(&json).unwrap();
        let mut restored = CentroidClassifier::new();
        restored_artifact.restore(&mut restored).unwrap();

        let labels = restored.predict(&[make_row(9.0)]).unwrap();
        assert_eq!(labels, vec!["b".to_string()]);
    }
}
