//! Training run: `ReadCorpus -> FitPipeline -> FitClassifier -> PersistArtifact -> Done`.
//!
//! Stages run strictly in order. Any failure ends the run and nothing is
//! written, so an existing artifact at the target path stays as it was.

use crate::artifact::{ArtifactError, ModelArtifact};
use crate::corpus::{self, CorpusError, TrainingCorpus};
use crate::encoder::UnseenPolicy;
use crate::forest::{BaggedForest, ForestError};
use crate::pipeline::{FeaturePipeline, PipelineError};
use crate::records::{FeatureVector, RecordError};
use smartcore::metrics::accuracy;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use sysinfo::{ProcessExt, System, SystemExt};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStage {
    ReadCorpus,
    FitPipeline,
    FitClassifier,
    PersistArtifact,
    Done,
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingStage::ReadCorpus => "read corpus",
            TrainingStage::FitPipeline => "fit pipeline",
            TrainingStage::FitClassifier => "fit classifier",
            TrainingStage::PersistArtifact => "persist artifact",
            TrainingStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("failed to read training corpus: {0}")]
    ReadCorpus(#[from] CorpusError),
    #[error("failed to fit feature pipeline: {0}")]
    FitPipeline(#[from] PipelineError),
    #[error("training row {row} could not be encoded: {source}")]
    Encode {
        row: usize,
        #[source]
        source: RecordError,
    },
    #[error("failed to fit classifier: {0}")]
    FitClassifier(#[from] ForestError),
    #[error("failed to export encoded features: {0}")]
    Export(#[source] CorpusError),
    #[error("failed to persist model artifact: {0}")]
    PersistArtifact(#[from] ArtifactError),
}

impl TrainingError {
    /// Stage the run was in when it aborted.
    pub fn stage(&self) -> TrainingStage {
        match self {
            TrainingError::ReadCorpus(_) => TrainingStage::ReadCorpus,
            TrainingError::FitPipeline(_) | TrainingError::Encode { .. } => {
                TrainingStage::FitPipeline
            }
            TrainingError::FitClassifier(_) => TrainingStage::FitClassifier,
            TrainingError::Export(_) | TrainingError::PersistArtifact(_) => {
                TrainingStage::PersistArtifact
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub corpus_path: PathBuf,
    pub artifact_path: PathBuf,
    pub unseen_policy: UnseenPolicy,
    /// Optional CSV/Parquet dump of the encoded training matrix.
    pub export_features: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub rows: usize,
    pub positives: usize,
    pub training_accuracy: f64,
    pub elapsed: Duration,
    pub memory_delta: u64,
}

/// Resident memory of this process in bytes; 0 when it cannot be read.
fn monitor_memory() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut sys = System::new();
    sys.refresh_process(pid);
    sys.process(pid).map(|p| p.memory()).unwrap_or(0)
}

/// Pipeline and classifier fitted in memory, plus the encoded training matrix.
pub struct FittedModel {
    pub artifact: ModelArtifact,
    pub features: Vec<FeatureVector>,
}

pub fn fit_model(
    corpus: &TrainingCorpus,
    unseen: UnseenPolicy,
) -> Result<FittedModel, TrainingError> {
    let pipeline = FeaturePipeline::fit(&corpus.records, unseen)?;
    let features = corpus
        .records
        .iter()
        .enumerate()
        .map(|(row, r)| {
            pipeline
                .transform(r)
                .map_err(|source| TrainingError::Encode { row, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("stage {}: done", TrainingStage::FitPipeline);

    let classifier = BaggedForest::fit(&features, &corpus.labels)?;
    log::info!(
        "stage {}: {} trees",
        TrainingStage::FitClassifier,
        classifier.n_trees()
    );

    Ok(FittedModel {
        artifact: ModelArtifact::new(pipeline, classifier, corpus.len(), corpus.positives()),
        features,
    })
}

pub fn train(options: &TrainingOptions) -> Result<TrainingReport, TrainingError> {
    let start_time = Instant::now();
    let start_memory = monitor_memory();

    log::info!("stage {}: {:?}", TrainingStage::ReadCorpus, options.corpus_path);
    let corpus = corpus::read_corpus(&options.corpus_path)?;

    let fitted = fit_model(&corpus, options.unseen_policy)?;
    let predicted = fitted.artifact.classifier.predict_batch(&fitted.features)?;
    let training_accuracy = accuracy(&corpus.labels, &predicted);
    log::info!("training accuracy: {:.4}", training_accuracy);

    log::info!(
        "stage {}: {:?}",
        TrainingStage::PersistArtifact,
        options.artifact_path
    );
    fitted.artifact.save(&options.artifact_path)?;

    if let Some(path) = &options.export_features {
        corpus::export_features(path, &fitted.features, &corpus.labels)
            .map_err(TrainingError::Export)?;
        log::info!("encoded training matrix written to {:?}", path);
    }

    let report = TrainingReport {
        rows: corpus.len(),
        positives: corpus.positives(),
        training_accuracy,
        elapsed: start_time.elapsed(),
        memory_delta: monitor_memory().saturating_sub(start_memory),
    };
    log::info!(
        "stage {}: {} rows ({} positive) in {:?}, memory used: {} bytes",
        TrainingStage::Done,
        report.rows,
        report.positives,
        report.elapsed,
        report.memory_delta
    );
    Ok(report)
}
