//! Tabular input/output
//!
//! CSV readers for the calibration, raw ACC and observation files, and CSV
//! writers for the assembled/ scored datasets. Timestamps use the
//! `"%Y-%m-%d %H:%M:%S"` UTC format throughout.

use crate::error::PipelineError;
use crate::types::{
    CalibrationRecord, FeatureVector, LabeledExample, Observation, RawSample, ScoredExample,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::Path;

/// Timestamp format of the raw device files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, PipelineError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| PipelineError::TimestampParse(value.to_string()))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Read per-device calibration coefficients. Empty cells become None and
/// fall back to the mean at fit time.
pub fn read_calibration(path: &Path) -> Result<Vec<CalibrationRecord>, PipelineError> {
    read_calibration_from(std::fs::File::open(path)?)
}

pub fn read_calibration_from<R: Read>(reader: R) -> Result<Vec<CalibrationRecord>, PipelineError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for result in csv_reader.deserialize() {
        let record: CalibrationRecord = result?;
        records.push(record);
    }
    Ok(records)
}

/// Read raw ACC samples. The marker column is selected by name so the
/// device-marker strategy can point at whichever column carries its tag;
/// a `behavior` column is picked up when present.
pub fn read_raw_samples(path: &Path, marker_column: &str) -> Result<Vec<RawSample>, PipelineError> {
    read_raw_samples_from(std::fs::File::open(path)?, marker_column)
}

pub fn read_raw_samples_from<R: Read>(
    reader: R,
    marker_column: &str,
) -> Result<Vec<RawSample>, PipelineError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let column = |name: &str| -> Result<usize, PipelineError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    };

    let device_idx = column("device_id")?;
    let timestamp_idx = column("timestamp")?;
    let marker_idx = column(marker_column)?;
    let x_idx = column("acc_x")?;
    let y_idx = column("acc_y")?;
    let z_idx = column("acc_z")?;
    let behavior_idx = headers.iter().position(|h| h == "behavior");

    let parse_axis = |record: &csv::StringRecord, idx: usize| -> Result<f64, PipelineError> {
        record[idx].trim().parse::<f64>().map_err(|_| {
            PipelineError::Integrity(format!("non-numeric acceleration value '{}'", &record[idx]))
        })
    };

    let mut samples = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let behavior = behavior_idx
            .map(|idx| record[idx].trim())
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string());
        samples.push(RawSample {
            device_id: record[device_idx].to_string(),
            timestamp: parse_timestamp(record[timestamp_idx].trim())?,
            marker: record[marker_idx].to_string(),
            acc_x: parse_axis(&record, x_idx)?,
            acc_y: parse_axis(&record, y_idx)?,
            acc_z: parse_axis(&record, z_idx)?,
            behavior,
        });
    }
    Ok(samples)
}

/// Read ground-truth observations (training flow only).
pub fn read_observations(path: &Path) -> Result<Vec<Observation>, PipelineError> {
    read_observations_from(std::fs::File::open(path)?)
}

pub fn read_observations_from<R: Read>(reader: R) -> Result<Vec<Observation>, PipelineError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let column = |name: &str| -> Result<usize, PipelineError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    };

    let device_idx = column("device_id")?;
    let timestamp_idx = column("timestamp")?;
    let behavior_idx = column("observed_behavior")?;

    let mut observations = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        observations.push(Observation {
            device_id: record[device_idx].to_string(),
            timestamp: parse_timestamp(record[timestamp_idx].trim())?,
            observed_behavior: record[behavior_idx].to_string(),
        });
    }
    Ok(observations)
}

/// Wide sample column names: `x_1..x_n`, `y_1..y_n`, `z_1..z_n`.
fn wide_column_names(bout_length: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(3 * bout_length);
    for axis in ["x", "y", "z"] {
        for i in 1..=bout_length {
            names.push(format!("{}_{}", axis, i));
        }
    }
    names
}

fn push_wide_values(row: &mut Vec<String>, x: &[f64], y: &[f64], z: &[f64]) {
    for axis in [x, y, z] {
        row.extend(axis.iter().map(|v| v.to_string()));
    }
}

fn push_feature_values(row: &mut Vec<String>, features: &FeatureVector) {
    row.extend(features.values().iter().map(|v| v.to_string()));
}

/// Write a labeled (train or test) dataset: keys, label, wide sample
/// columns, feature columns.
pub fn write_labeled_examples(
    path: &Path,
    examples: &[LabeledExample],
    bout_length: usize,
) -> Result<(), PipelineError> {
    write_labeled_examples_to(std::fs::File::create(path)?, examples, bout_length)
}

pub fn write_labeled_examples_to<W: Write>(
    writer: W,
    examples: &[LabeledExample],
    bout_length: usize,
) -> Result<(), PipelineError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["device_id".to_string(), "bout_id".to_string(), "label".to_string()];
    header.extend(wide_column_names(bout_length));
    header.extend(FeatureVector::column_names());
    csv_writer.write_record(&header)?;

    for labeled in examples {
        let example = &labeled.example;
        let mut row = vec![
            example.device_id.clone(),
            example.bout_id.to_string(),
            labeled.label.clone(),
        ];
        push_wide_values(&mut row, &example.samples_x, &example.samples_y, &example.samples_z);
        push_feature_values(&mut row, &example.features);
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the scored inference dataset: keys, bout timestamp, wide sample
/// columns, feature columns, predicted label, per-class probabilities and
/// confidence.
pub fn write_scored_examples(
    path: &Path,
    scored: &[ScoredExample],
    bout_length: usize,
) -> Result<(), PipelineError> {
    write_scored_examples_to(std::fs::File::create(path)?, scored, bout_length)
}

pub fn write_scored_examples_to<W: Write>(
    writer: W,
    scored: &[ScoredExample],
    bout_length: usize,
) -> Result<(), PipelineError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let classes: BTreeSet<String> = scored
        .iter()
        .flat_map(|s| s.result.probabilities.keys().cloned())
        .collect();

    let mut header = vec![
        "device_id".to_string(),
        "bout_id".to_string(),
        "timestamp".to_string(),
    ];
    header.extend(wide_column_names(bout_length));
    header.extend(FeatureVector::column_names());
    header.push("predicted_label".to_string());
    header.extend(classes.iter().map(|c| format!("prob_{}", c)));
    header.push("confidence".to_string());
    csv_writer.write_record(&header)?;

    for entry in scored {
        let example = &entry.example;
        let mut row = vec![
            example.device_id.clone(),
            example.bout_id.to_string(),
            format_timestamp(&example.start_time),
        ];
        push_wide_values(&mut row, &example.samples_x, &example.samples_y, &example.samples_z);
        push_feature_values(&mut row, &example.features);
        row.push(entry.result.predicted_label.clone());
        for class in &classes {
            let p = entry.result.probabilities.get(class).copied().unwrap_or(0.0);
            row.push(p.to_string());
        }
        row.push(entry.result.confidence.to_string());
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
