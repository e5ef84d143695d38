//! Wide-format assembly
//!
//! Reshapes each bout's ordered samples into per-axis, per-sample-index
//! columns and merges them with the bout's feature vector into one
//! [`Example`] row per surviving bout. Join keys must match exactly; an
//! unmatched bout is a data-integrity error, never a partial merge.

use crate::error::PipelineError;
use crate::features::group_bouts;
use crate::labels::uniform_label;
use crate::types::{Example, FeatureVector, SegmentedSample};
use std::collections::HashMap;

/// Merge filtered samples with extracted features, one row per bout.
pub fn assemble(
    samples: &[SegmentedSample],
    features: Vec<FeatureVector>,
    bout_length: usize,
) -> Result<Vec<Example>, PipelineError> {
    let mut by_key: HashMap<(String, u64), FeatureVector> = features
        .into_iter()
        .map(|f| ((f.device_id.clone(), f.bout_id), f))
        .collect();

    let mut examples = Vec::new();
    for group in group_bouts(samples) {
        let device_id = group[0].sample.device_id.clone();
        let bout_id = group[0].bout_id;

        if group.len() != bout_length {
            return Err(PipelineError::Integrity(format!(
                "bout {} of device {} reached assembly with {} samples, expected {}",
                bout_id,
                device_id,
                group.len(),
                bout_length
            )));
        }

        let features = by_key.remove(&(device_id.clone(), bout_id)).ok_or_else(|| {
            PipelineError::Integrity(format!(
                "no feature vector for bout {} of device {}",
                bout_id, device_id
            ))
        })?;

        let refs: Vec<&SegmentedSample> = group.iter().collect();
        examples.push(Example {
            device_id,
            bout_id,
            start_time: group[0].sample.timestamp,
            samples_x: group.iter().map(|s| s.sample.acc_x).collect(),
            samples_y: group.iter().map(|s| s.sample.acc_y).collect(),
            samples_z: group.iter().map(|s| s.sample.acc_z).collect(),
            features,
            label: uniform_label(&refs),
        });
    }

    if !by_key.is_empty() {
        let mut orphans: Vec<String> = by_key
            .keys()
            .map(|(device, bout)| format!("{}/{}", device, bout))
            .collect();
        orphans.sort();
        return Err(PipelineError::Integrity(format!(
            "feature vectors without matching bouts: {}",
            orphans.join(", ")
        )));
    }

    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::extract_features;
    use crate::types::RawSample;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn make_bout(bout_id: u64, len: usize, label: Option<&str>) -> Vec<SegmentedSample> {
        (0..len)
            .map(|i| SegmentedSample {
                sample: RawSample {
                    device_id: "d1".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2022, 3, 1, 8, 0, 0).unwrap()
                        + Duration::seconds((bout_id as i64) * 1000 + i as i64),
                    marker: "acc".to_string(),
                    acc_x: i as f64,
                    acc_y: i as f64 * 2.0,
                    acc_z: i as f64 * 3.0,
                    behavior: label.map(|l| l.to_string()),
                },
                bout_id,
            })
            .collect()
    }

    #[test]
    fn test_one_row_per_bout_with_ordered_columns() {
        let mut samples = make_bout(1, 4, Some("soaring"));
        samples.extend(make_bout(2, 4, None));
        let features = extract_features(&samples);

        let examples = assemble(&samples, features, 4).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].samples_x, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(examples[0].samples_y, vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!(examples[0].samples_z.len(), 4);
        assert_eq!(examples[0].label.as_deref(), Some("soaring"));
        assert_eq!(examples[1].label, None);
        assert_eq!(examples[0].start_time, samples[0].sample.timestamp);
    }

    #[test]
    fn test_missing_feature_vector_is_integrity_error() {
        let samples = make_bout(1, 4, None);
        let err = assemble(&samples, Vec::new(), 4).unwrap_err();
        assert!(matches!(err, PipelineError::Integrity(_)));
    }

    #[test]
    fn test_orphan_feature_vector_is_integrity_error() {
        let samples = make_bout(1, 4, None);
        let mut features = extract_features(&samples);
        features.extend(extract_features(&make_bout(9, 4, None)));

        let err = assemble(&samples, features, 4).unwrap_err();
        assert!(matches!(err, PipelineError::Integrity(_)));
    }

    #[test]
    fn test_wrong_length_bout_is_integrity_error() {
        let samples = make_bout(1, 3, None);
        let features = extract_features(&samples);
        let err = assemble(&samples, features, 4).unwrap_err();
        assert!(matches!(err, PipelineError::Integrity(_)));
    }
}
