//! Pipeline orchestration
//!
//! Composes the stages strictly in order: calibration → segmentation →
//! label propagation → integrity filter → feature extraction → wide-format
//! assembly, then (training) stratified split and model fitting, or
//! (inference) classification with confidence scoring.

use crate::calibration::CalibrationNormalizer;
use crate::classifier::{classify_examples, fit_classifier, Classifier, ModelArtifact};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::features::extract_features;
use crate::filter::filter_bouts;
use crate::labels::{attach_observations, propagate_labels};
use crate::segmenter::segmenter_from_config;
use crate::splitter::{stratified_split, Split};
use crate::types::{
    CalibrationRecord, Example, LabeledExample, Observation, RawSample, ScoredExample,
};
use crate::wide::assemble;
use log::info;
use serde::{Deserialize, Serialize};

/// Counters describing one pipeline run, so the systemic data-loss paths are
/// observable instead of silent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub input_samples: usize,
    pub bouts_segmented: usize,
    pub bouts_retained: usize,
    pub bouts_dropped: usize,
    pub unlabeled_bouts: usize,
    pub gap_violations: usize,
}

/// A stratified train/test partition with its run summary.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub train: Vec<LabeledExample>,
    pub test: Vec<LabeledExample>,
    pub summary: PipelineSummary,
}

/// The pipeline, driven by one immutable configuration value.
pub struct BoutPipeline {
    config: PipelineConfig,
}

impl BoutPipeline {
    /// Create a pipeline after validating the configuration.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the shared stages and assemble one wide-format example per
    /// surviving bout. Observations are joined before segmentation when
    /// present (training flow).
    pub fn assemble_examples(
        &self,
        samples: Vec<RawSample>,
        calibrations: &[CalibrationRecord],
        observations: Option<&[Observation]>,
    ) -> Result<(Vec<Example>, PipelineSummary), PipelineError> {
        let input_samples = samples.len();

        let normalizer = CalibrationNormalizer::fit(calibrations)?;
        let mut samples = normalizer.normalize(samples);

        if let Some(observations) = observations {
            attach_observations(&mut samples, observations);
        }

        let segmenter = segmenter_from_config(&self.config);
        let outcome = segmenter.segment(samples);
        let gap_violations = outcome.gap_violations.len();

        let mut segmented = outcome.samples;
        propagate_labels(&mut segmented);

        let filtered = filter_bouts(segmented, self.config.bout_length());
        let features = extract_features(&filtered.samples);
        let examples = assemble(&filtered.samples, features, self.config.bout_length())?;

        let unlabeled_bouts = examples.iter().filter(|e| e.label.is_none()).count();
        let summary = PipelineSummary {
            input_samples,
            bouts_segmented: filtered.retained_bouts + filtered.dropped_bouts,
            bouts_retained: filtered.retained_bouts,
            bouts_dropped: filtered.dropped_bouts,
            unlabeled_bouts,
            gap_violations,
        };
        info!(
            "assembled {} example(s) from {} sample(s), {} bout(s) dropped",
            examples.len(),
            summary.input_samples,
            summary.bouts_dropped
        );

        Ok((examples, summary))
    }

    /// Training flow: assemble labeled examples and split them into
    /// stratified train/test partitions. Unlabeled bouts are excluded and
    /// counted in the summary.
    pub fn build_training_set(
        &self,
        samples: Vec<RawSample>,
        calibrations: &[CalibrationRecord],
        observations: &[Observation],
    ) -> Result<TrainingSet, PipelineError> {
        let (examples, summary) =
            self.assemble_examples(samples, calibrations, Some(observations))?;

        let labeled: Vec<LabeledExample> = examples
            .into_iter()
            .filter_map(Example::into_labeled)
            .collect();
        let split: Split = stratified_split(
            labeled,
            self.config.train_proportion,
            self.config.split_seed,
        );

        Ok(TrainingSet {
            train: split.train,
            test: split.test,
            summary,
        })
    }

    /// Fit the classifier on a training partition and capture the trained
    /// model as a persistable artifact.
    pub fn train(
        &self,
        classifier: &mut dyn Classifier,
        train: &[LabeledExample],
    ) -> Result<ModelArtifact, PipelineError> {
        fit_classifier(classifier, train)?;
        ModelArtifact::capture(classifier)
    }

    /// Inference flow: assemble unlabeled examples from a new stream and
    /// classify them, attaching a confidence score per prediction.
    pub fn classify(
        &self,
        classifier: &dyn Classifier,
        samples: Vec<RawSample>,
        calibrations: &[CalibrationRecord],
    ) -> Result<(Vec<ScoredExample>, PipelineSummary), PipelineError> {
        let (examples, summary) = self.assemble_examples(samples, calibrations, None)?;
        let scored = classify_examples(classifier, examples)?;
        Ok((scored, summary))
    }
}
