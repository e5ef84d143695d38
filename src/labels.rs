//! Behavior label handling
//!
//! Joins field observations onto raw samples by exact (device_id, timestamp)
//! match, and fills label gaps within each bout by carrying the last
//! observed label forward in original row order.

use crate::types::{Observation, RawSample, SegmentedSample};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Attach observed behaviors to samples. Only exact (device_id, timestamp)
/// matches receive a label; unmatched samples keep `behavior = None`.
pub fn attach_observations(samples: &mut [RawSample], observations: &[Observation]) {
    let by_key: HashMap<(&str, DateTime<Utc>), &str> = observations
        .iter()
        .map(|o| ((o.device_id.as_str(), o.timestamp), o.observed_behavior.as_str()))
        .collect();

    for sample in samples.iter_mut() {
        if sample.behavior.is_none() {
            if let Some(behavior) = by_key.get(&(sample.device_id.as_str(), sample.timestamp)) {
                sample.behavior = Some(behavior.to_string());
            }
        }
    }
}

/// Carry the last observed label forward within each bout, in row order.
/// The carry resets at every bout boundary; rows before the first labeled
/// row of a bout stay unlabeled, which leaves the bout flagged unlabeled
/// downstream rather than borrowing a neighboring bout's class.
pub fn propagate_labels(samples: &mut [SegmentedSample]) {
    let mut current_bout: Option<u64> = None;
    let mut carried: Option<String> = None;

    for segmented in samples.iter_mut() {
        if current_bout != Some(segmented.bout_id) {
            current_bout = Some(segmented.bout_id);
            carried = None;
        }
        match &segmented.sample.behavior {
            Some(label) => carried = Some(label.clone()),
            None => segmented.sample.behavior = carried.clone(),
        }
    }
}

/// The bout's uniform label: Some only when every sample in the group
/// carries the same label after propagation.
pub fn uniform_label(samples: &[&SegmentedSample]) -> Option<String> {
    let first = samples.first()?.sample.behavior.clone()?;
    if samples
        .iter()
        .all(|s| s.sample.behavior.as_deref() == Some(first.as_str()))
    {
        Some(first)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_sample(offset_secs: i64, behavior: Option<&str>) -> RawSample {
        RawSample {
            device_id: "d1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2022, 3, 1, 8, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
            marker: "acc".to_string(),
            acc_x: 0.0,
            acc_y: 0.0,
            acc_z: 0.0,
            behavior: behavior.map(|b| b.to_string()),
        }
    }

    fn segmented(bout_id: u64, sample: RawSample) -> SegmentedSample {
        SegmentedSample { sample, bout_id }
    }

    #[test]
    fn test_attach_exact_match_only() {
        let mut samples = vec![make_sample(0, None), make_sample(1, None)];
        let observations = vec![Observation {
            device_id: "d1".to_string(),
            timestamp: samples[0].timestamp,
            observed_behavior: "soaring".to_string(),
        }];

        attach_observations(&mut samples, &observations);
        assert_eq!(samples[0].behavior.as_deref(), Some("soaring"));
        assert_eq!(samples[1].behavior, None);
    }

    #[test]
    fn test_propagation_fills_forward_within_bout() {
        let mut samples = vec![
            segmented(1, make_sample(0, Some("flapping"))),
            segmented(1, make_sample(1, None)),
            segmented(1, make_sample(2, None)),
            segmented(2, make_sample(3, None)),
        ];

        propagate_labels(&mut samples);
        assert_eq!(samples[1].sample.behavior.as_deref(), Some("flapping"));
        assert_eq!(samples[2].sample.behavior.as_deref(), Some("flapping"));
        // The carry does not leak across the bout boundary.
        assert_eq!(samples[3].sample.behavior, None);
    }

    #[test]
    fn test_bout_without_labeled_row_stays_unlabeled() {
        let mut samples = vec![
            segmented(1, make_sample(0, None)),
            segmented(1, make_sample(1, None)),
        ];

        propagate_labels(&mut samples);
        let refs: Vec<&SegmentedSample> = samples.iter().collect();
        assert_eq!(uniform_label(&refs), None);
    }

    #[test]
    fn test_uniform_label_requires_every_row() {
        let samples = vec![
            segmented(1, make_sample(0, None)),
            segmented(1, make_sample(1, Some("resting"))),
        ];
        let refs: Vec<&SegmentedSample> = samples.iter().collect();
        // First row never got filled (label appeared later), so the bout is
        // flagged unlabeled instead of being assigned "resting".
        assert_eq!(uniform_label(&refs), None);
    }
}
