//! Instrument calibration
//!
//! Maps raw accelerometer counts to acceleration with per-device linear
//! coefficients: `acc = (raw - intercept) * slope` per axis. Devices (or
//! single axes) missing from the calibration set fall back to the mean of
//! all known coefficients, computed once when the normalizer is fitted.

use crate::error::PipelineError;
use crate::types::{CalibrationRecord, RawSample};
use log::debug;
use std::collections::HashMap;

/// Fully resolved coefficients for one device, fallbacks already applied.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ResolvedCalibration {
    slope_x: f64,
    intercept_x: f64,
    slope_y: f64,
    intercept_y: f64,
    slope_z: f64,
    intercept_z: f64,
}

/// Calibration normalizer, fitted once over the calibration set.
#[derive(Debug, Clone)]
pub struct CalibrationNormalizer {
    by_device: HashMap<String, ResolvedCalibration>,
    fallback: ResolvedCalibration,
}

impl CalibrationNormalizer {
    /// Fit the normalizer: compute the per-axis mean slope and intercept over
    /// all known records, then resolve every device against those means.
    ///
    /// Fails with a configuration error when the calibration set is empty
    /// (the fallback mean is undefined).
    pub fn fit(records: &[CalibrationRecord]) -> Result<Self, PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::Configuration(
                "calibration set is empty, fallback means are undefined".to_string(),
            ));
        }

        let fallback = ResolvedCalibration {
            slope_x: mean_of(records, |r| r.slope_x, "slope_x")?,
            intercept_x: mean_of(records, |r| r.intercept_x, "intercept_x")?,
            slope_y: mean_of(records, |r| r.slope_y, "slope_y")?,
            intercept_y: mean_of(records, |r| r.intercept_y, "intercept_y")?,
            slope_z: mean_of(records, |r| r.slope_z, "slope_z")?,
            intercept_z: mean_of(records, |r| r.intercept_z, "intercept_z")?,
        };

        let mut by_device = HashMap::new();
        for record in records {
            by_device.insert(
                record.device_id.clone(),
                ResolvedCalibration {
                    slope_x: record.slope_x.unwrap_or(fallback.slope_x),
                    intercept_x: record.intercept_x.unwrap_or(fallback.intercept_x),
                    slope_y: record.slope_y.unwrap_or(fallback.slope_y),
                    intercept_y: record.intercept_y.unwrap_or(fallback.intercept_y),
                    slope_z: record.slope_z.unwrap_or(fallback.slope_z),
                    intercept_z: record.intercept_z.unwrap_or(fallback.intercept_z),
                },
            );
        }

        Ok(Self {
            by_device,
            fallback,
        })
    }

    /// Apply `(raw - intercept) * slope` per axis to every sample.
    pub fn normalize(&self, samples: Vec<RawSample>) -> Vec<RawSample> {
        samples
            .into_iter()
            .map(|mut sample| {
                let cal = match self.by_device.get(&sample.device_id) {
                    Some(cal) => cal,
                    None => {
                        debug!(
                            "no calibration record for device {}, using mean coefficients",
                            sample.device_id
                        );
                        &self.fallback
                    }
                };
                sample.acc_x = (sample.acc_x - cal.intercept_x) * cal.slope_x;
                sample.acc_y = (sample.acc_y - cal.intercept_y) * cal.slope_y;
                sample.acc_z = (sample.acc_z - cal.intercept_z) * cal.slope_z;
                sample
            })
            .collect()
    }
}

/// Mean over the known values of one coefficient. Fails when the coefficient
/// is absent from every record.
fn mean_of(
    records: &[CalibrationRecord],
    field: impl Fn(&CalibrationRecord) -> Option<f64>,
    name: &str,
) -> Result<f64, PipelineError> {
    let known: Vec<f64> = records.iter().filter_map(&field).collect();
    if known.is_empty() {
        return Err(PipelineError::Configuration(format!(
            "no known {} in calibration set, mean is undefined",
            name
        )));
    }
    Ok(known.iter().sum::<f64>() / known.len() as f64)
}
