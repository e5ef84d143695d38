//! accflow CLI
//!
//! Commands:
//! - build: assemble a labeled training set from raw streams, split it,
//!   train a model and persist the artifact
//! - apply: load a persisted model and classify a new raw stream

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use accflow::io::{
    read_calibration, read_observations, read_raw_samples, write_labeled_examples,
    write_scored_examples,
};
use accflow::{
    BoutPipeline, CentroidClassifier, ModelArtifact, ModelSource, PipelineConfig, PipelineError,
    RawSample, ACCFLOW_VERSION,
};

/// accflow - accelerometer bout segmentation and behavior classification
#[derive(Parser)]
#[command(name = "accflow")]
#[command(version = ACCFLOW_VERSION)]
#[command(about = "Transform raw ACC streams into labeled or scored bout datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a training set, train a model and persist it
    Build {
        /// Raw ACC file(s), processed in the given order
        #[arg(short, long, required = true, num_args = 1..)]
        raw: Vec<PathBuf>,

        /// Calibration file
        #[arg(short, long)]
        calibration: PathBuf,

        /// Observations file with ground-truth behaviors
        #[arg(short, long)]
        observations: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Directory for the persisted model artifact
        #[arg(long, default_value = ".")]
        model_dir: PathBuf,

        /// Output path for the training partition
        #[arg(long)]
        train_out: PathBuf,

        /// Output path for the test partition
        #[arg(long)]
        test_out: PathBuf,
    },

    /// Classify a new raw stream with a persisted model
    Apply {
        /// Raw ACC file(s), processed in the given order
        #[arg(short, long, required = true, num_args = 1..)]
        raw: Vec<PathBuf>,

        /// Calibration file
        #[arg(short, long)]
        calibration: PathBuf,

        /// Pipeline configuration (JSON), must name an rf_model
        #[arg(long)]
        config: PathBuf,

        /// Directory holding the persisted model artifacts
        #[arg(long, default_value = ".")]
        model_dir: PathBuf,

        /// Output path for the scored dataset
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    match cli.command {
        Commands::Build {
            raw,
            calibration,
            observations,
            config,
            model_dir,
            train_out,
            test_out,
        } => cmd_build(
            &raw,
            &calibration,
            &observations,
            &config,
            &model_dir,
            &train_out,
            &test_out,
        ),

        Commands::Apply {
            raw,
            calibration,
            config,
            model_dir,
            output,
        } => cmd_apply(&raw, &calibration, &config, &model_dir, &output),
    }
}

fn load_config(path: &Path) -> Result<PipelineConfig, PipelineError> {
    PipelineConfig::from_json(&std::fs::read_to_string(path)?)
}

fn load_raw(paths: &[PathBuf], marker_column: &str) -> Result<Vec<RawSample>, PipelineError> {
    let mut samples = Vec::new();
    for path in paths {
        samples.extend(read_raw_samples(path, marker_column)?);
    }
    Ok(samples)
}

fn cmd_build(
    raw: &[PathBuf],
    calibration: &Path,
    observations: &Path,
    config: &Path,
    model_dir: &Path,
    train_out: &Path,
    test_out: &Path,
) -> Result<(), PipelineError> {
    let config = load_config(config)?;
    let pipeline = BoutPipeline::new(config)?;

    let samples = load_raw(raw, pipeline.config().marker_column())?;
    let calibrations = read_calibration(calibration)?;
    let observations = read_observations(observations)?;

    let training_set = pipeline.build_training_set(samples, &calibrations, &observations)?;

    let mut classifier = CentroidClassifier::new();
    let artifact = pipeline.train(&mut classifier, &training_set.train)?;
    let artifact_path = ModelSource::OwnModel.artifact_path(model_dir);
    artifact.save(&artifact_path)?;

    let bout_length = pipeline.config().bout_length();
    write_labeled_examples(train_out, &training_set.train, bout_length)?;
    write_labeled_examples(test_out, &training_set.test, bout_length)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&training_set.summary)?
    );
    println!(
        "model {} ({} classes) saved to {}",
        artifact.model_id,
        artifact.classes.len(),
        artifact_path.display()
    );
    Ok(())
}

fn cmd_apply(
    raw: &[PathBuf],
    calibration: &Path,
    config: &Path,
    model_dir: &Path,
    output: &Path,
) -> Result<(), PipelineError> {
    let config = load_config(config)?;
    let source = config.rf_model.ok_or_else(|| {
        PipelineError::Configuration("apply flow requires an rf_model selector".to_string())
    })?;
    let pipeline = BoutPipeline::new(config)?;

    let samples = load_raw(raw, pipeline.config().marker_column())?;
    let calibrations = read_calibration(calibration)?;

    let artifact = ModelArtifact::load(&source.artifact_path(model_dir))?;
    let mut classifier = CentroidClassifier::new();
    artifact.restore(&mut classifier)?;

    let (scored, summary) = pipeline.classify(&classifier, samples, &calibrations)?;
    write_scored_examples(output, &scored, pipeline.config().bout_length())?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("{} bout(s) classified, written to {}", scored.len(), output.display());
    Ok(())
}
