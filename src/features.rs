//! Per-bout feature extraction
//!
//! Computes the fixed 45-scalar statistical feature vector for each
//! (device_id, bout_id) group: per-axis moments, quartiles, Euclidean norm
//! and mean amplitude, plus pairwise covariance, correlation and elementwise
//! difference statistics.

use crate::types::{AxisStats, FeatureVector, PairStats, SegmentedSample};
use statrs::statistics::Statistics;

/// Extract one feature vector per bout. Samples must arrive grouped by bout
/// in within-bout order, as the upstream stages produce them.
pub fn extract_features(samples: &[SegmentedSample]) -> Vec<FeatureVector> {
    group_bouts(samples)
        .into_iter()
        .map(|group| {
            let xs: Vec<f64> = group.iter().map(|s| s.sample.acc_x).collect();
            let ys: Vec<f64> = group.iter().map(|s| s.sample.acc_y).collect();
            let zs: Vec<f64> = group.iter().map(|s| s.sample.acc_z).collect();

            FeatureVector {
                device_id: group[0].sample.device_id.clone(),
                bout_id: group[0].bout_id,
                x: axis_stats(&xs),
                y: axis_stats(&ys),
                z: axis_stats(&zs),
                xy: pair_stats(&xs, &ys),
                xz: pair_stats(&xs, &zs),
                yz: pair_stats(&ys, &zs),
            }
        })
        .collect()
}

/// Split the stream into consecutive runs of one bout id.
pub(crate) fn group_bouts(samples: &[SegmentedSample]) -> Vec<&[SegmentedSample]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=samples.len() {
        if i == samples.len() || samples[i].bout_id != samples[start].bout_id {
            groups.push(&samples[start..i]);
            start = i;
        }
    }
    groups
}

fn axis_stats(values: &[f64]) -> AxisStats {
    AxisStats {
        mean: Statistics::mean(values),
        sd: Statistics::std_dev(values),
        skewness: skewness(values),
        kurtosis: excess_kurtosis(values),
        max: Statistics::max(values),
        min: Statistics::min(values),
        norm: values.iter().map(|v| v * v).sum::<f64>().sqrt(),
        q25: quantile(values, 0.25),
        q50: quantile(values, 0.50),
        q75: quantile(values, 0.75),
        mean_amplitude: mean_amplitude(values),
    }
}

fn pair_stats(a: &[f64], b: &[f64]) -> PairStats {
    let diffs: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    let cov = covariance(a, b);
    let sd_a = Statistics::std_dev(a);
    let sd_b = Statistics::std_dev(b);

    PairStats {
        covariance: cov,
        correlation: cov / (sd_a * sd_b),
        diff_mean: Statistics::mean(&diffs),
        diff_sd: Statistics::std_dev(&diffs),
    }
}

/// Sample covariance (n - 1 divisor).
fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean_a = Statistics::mean(a);
    let mean_b = Statistics::mean(b);
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Bias-adjusted sample skewness. Undefined below 3 samples.
fn skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return f64::NAN;
    }
    let mean = Statistics::mean(values);
    let m2 = central_moment(values, mean, 2);
    let m3 = central_moment(values, mean, 3);
    if m2 == 0.0 {
        return f64::NAN;
    }
    let g1 = m3 / m2.powf(1.5);
    let nf = n as f64;
    g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0)
}

/// Bias-adjusted excess kurtosis. Undefined below 4 samples.
fn excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return f64::NAN;
    }
    let mean = Statistics::mean(values);
    let m2 = central_moment(values, mean, 2);
    let m4 = central_moment(values, mean, 4);
    if m2 == 0.0 {
        return f64::NAN;
    }
    let g2 = m4 / (m2 * m2) - 3.0;
    let nf = n as f64;
    ((nf + 1.0) * g2 + 6.0) * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0))
}

fn central_moment(values: &[f64], mean: f64, order: i32) -> f64 {
    values.iter().map(|v| (v - mean).powi(order)).sum::<f64>() / values.len() as f64
}

/// Linear-interpolation quantile over the sorted values.
fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let frac = pos - lower as f64;
    if lower + 1 < sorted.len() {
        sorted[lower] + frac * (sorted[lower + 1] - sorted[lower])
    } else {
        sorted[lower]
    }
}

/// Mean amplitude: the average absolute difference between successive local
/// extrema of the within-bout signal.
///
/// Extrema are found where the sign of the first difference changes (the
/// second difference of signs has magnitude 2). With fewer than two extrema
/// the statistic is undefined and resolves to NaN rather than 0.
pub fn mean_amplitude(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return f64::NAN;
    }

    let signs: Vec<f64> = values.windows(2).map(|w| sign(w[1] - w[0])).collect();
    let extrema: Vec<usize> = signs
        .windows(2)
        .enumerate()
        .filter(|(_, w)| (w[1] - w[0]).abs() == 2.0)
        .map(|(i, _)| i + 1)
        .collect();

    if extrema.len() < 2 {
        return f64::NAN;
    }

    // Each consecutive extremum pair contributes one oscillation magnitude.
    let amplitudes: Vec<f64> = extrema
        .windows(2)
        .map(|pair| (values[pair[1]] - values[pair[0]]).abs())
        .collect();
    amplitudes.iter().sum::<f64>() / amplitudes.len() as f64
}

fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawSample;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bout(device_id: &str, bout_id: u64, triples: &[(f64, f64, f64)]) -> Vec<SegmentedSample> {
        triples
            .iter()
            .enumerate()
            .map(|(i, (x, y, z))| SegmentedSample {
                sample: RawSample {
                    device_id: device_id.to_string(),
                    timestamp: Utc.with_ymd_and_hms(2022, 3, 1, 8, 0, 0).unwrap()
                        + Duration::seconds(i as i64),
                    marker: "acc".to_string(),
                    acc_x: *x,
                    acc_y: *y,
                    acc_z: *z,
                    behavior: None,
                },
                bout_id,
            })
            .collect()
    }

    #[test]
    fn test_mean_amplitude_alternating_sequence() {
        // Interior extrema at indices 1, 2, 3 with values 2, 0, 2.
        let amplitude = mean_amplitude(&[0.0, 2.0, 0.0, 2.0, 0.0]);
        assert!((amplitude - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_amplitude_monotonic_is_undefined() {
        assert!(mean_amplitude(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_nan());
    }

    #[test]
    fn test_mean_amplitude_single_extremum_is_undefined() {
        assert!(mean_amplitude(&[0.0, 1.0, 0.5]).is_nan());
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&values, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&values, 0.75) - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_sample_standard_deviation_divisor() {
        // Sample sd of [1, 2, 3] is 1 exactly with the n-1 divisor.
        let stats = axis_stats(&[1.0, 2.0, 3.0]);
        assert!((stats.sd - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_skewness_of_symmetric_sequence_is_zero() {
        assert!(skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_of_identical_axes_is_one() {
        let values = [1.0, 3.0, 2.0, 5.0, 4.0];
        let stats = pair_stats(&values, &values);
        assert!((stats.correlation - 1.0).abs() < 1e-12);
        assert!(stats.diff_mean.abs() < 1e-12);
        assert!(stats.diff_sd.abs() < 1e-12);
    }

    #[test]
    fn test_extract_one_vector_per_bout() {
        let mut samples = make_bout("d1", 1, &[(1.0, 0.0, 0.0), (2.0, 1.0, 0.0), (3.0, 0.0, 1.0)]);
        samples.extend(make_bout("d1", 2, &[(5.0, 5.0, 5.0), (6.0, 4.0, 5.0), (7.0, 5.0, 4.0)]));

        let features = extract_features(&samples);
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].bout_id, 1);
        assert_eq!(features[1].bout_id, 2);
        assert!((features[0].x.mean - 2.0).abs() < 1e-12);
        assert!((features[1].x.mean - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_norm_is_root_sum_of_squares() {
        let stats = axis_stats(&[3.0, 4.0]);
        assert!((stats.norm - 5.0).abs() < 1e-12);
    }
}
