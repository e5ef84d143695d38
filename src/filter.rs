//! Bout integrity filtering
//!
//! Retains only bouts whose sample count equals the configured bout length.
//! This is a hard equality check: partial bouts are dropped entirely and
//! never padded. Bout 0 (rows seen before the first bout boundary) is always
//! dropped.

use crate::types::SegmentedSample;
use log::info;
use std::collections::HashMap;

/// Result of the integrity filter, with the systemic data-loss path made
/// observable instead of swallowed.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub samples: Vec<SegmentedSample>,
    /// Number of bouts dropped for having a sample count != bout_length
    pub dropped_bouts: usize,
    /// Number of bouts retained
    pub retained_bouts: usize,
}

/// Drop every bout whose sample count differs from `bout_length`.
pub fn filter_bouts(samples: Vec<SegmentedSample>, bout_length: usize) -> FilterOutcome {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for sample in &samples {
        *counts.entry(sample.bout_id).or_insert(0) += 1;
    }

    let retained_bouts = counts
        .iter()
        .filter(|(id, count)| **id != 0 && **count == bout_length)
        .count();
    let dropped_bouts = counts.len() - retained_bouts;

    let samples: Vec<SegmentedSample> = samples
        .into_iter()
        .filter(|s| s.bout_id != 0 && counts[&s.bout_id] == bout_length)
        .collect();

    if dropped_bouts > 0 {
        info!(
            "integrity filter dropped {} bout(s) with sample count != {}",
            dropped_bouts, bout_length
        );
    }

    FilterOutcome {
        samples,
        dropped_bouts,
        retained_bouts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawSample;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn make_bout(bout_id: u64, len: usize) -> Vec<SegmentedSample> {
        (0..len)
            .map(|i| SegmentedSample {
                sample: RawSample {
                    device_id: "d1".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2022, 3, 1, 8, 0, 0).unwrap()
                        + Duration::seconds((bout_id as i64) * 1000 + i as i64),
                    marker: "acc".to_string(),
                    acc_x: 0.0,
                    acc_y: 0.0,
                    acc_z: 0.0,
                    behavior: None,
                },
                bout_id,
            })
            .collect()
    }

    #[test]
    fn test_short_bout_is_dropped_entirely() {
        let mut samples = make_bout(1, 99);
        samples.extend(make_bout(2, 100));

        let outcome = filter_bouts(samples, 100);
        assert!(outcome.samples.iter().all(|s| s.bout_id == 2));
        assert_eq!(outcome.samples.len(), 100);
        assert_eq!(outcome.dropped_bouts, 1);
        assert_eq!(outcome.retained_bouts, 1);
    }

    #[test]
    fn test_exact_length_bout_is_retained_unchanged() {
        let samples = make_bout(1, 100);
        let timestamps: Vec<_> = samples.iter().map(|s| s.sample.timestamp).collect();

        let outcome = filter_bouts(samples, 100);
        assert_eq!(outcome.samples.len(), 100);
        let kept: Vec<_> = outcome.samples.iter().map(|s| s.sample.timestamp).collect();
        assert_eq!(kept, timestamps);
    }

    #[test]
    fn test_over_length_bout_is_dropped() {
        let outcome = filter_bouts(make_bout(1, 101), 100);
        assert!(outcome.samples.is_empty());
        assert_eq!(outcome.dropped_bouts, 1);
    }

    #[test]
    fn test_bout_zero_always_dropped() {
        let outcome = filter_bouts(make_bout(0, 100), 100);
        assert!(outcome.samples.is_empty());
        assert_eq!(outcome.dropped_bouts, 1);
    }
}
