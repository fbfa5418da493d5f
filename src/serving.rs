//! Scoring one record against a loaded model.
//!
//! The model lives behind an [`ArtifactHandle`] that callers create once and
//! pass to every front end. Loading is lazy and happens at most once per
//! successful load; retraining swaps in a whole new `Arc<ModelArtifact>`.

use crate::artifact::{ArtifactError, ModelArtifact};
use crate::forest::{label_for, ForestError};
use crate::records::{Record, RecordError};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("model not ready: {0}")]
    ModelNotReady(#[source] ArtifactError),
    #[error("invalid input: {0}")]
    MalformedRecord(#[source] RecordError),
    #[error("invalid input: field '{field}' has unrecognised value '{value}'")]
    UnseenCategory { field: String, value: String },
    #[error("inference failed: {0}")]
    Inference(#[from] ForestError),
}

impl From<RecordError> for ServeError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::UnseenCategory { field, value } => {
                ServeError::UnseenCategory { field, value }
            }
            other => ServeError::MalformedRecord(other),
        }
    }
}

impl From<ArtifactError> for ServeError {
    fn from(e: ArtifactError) -> Self {
        ServeError::ModelNotReady(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrokeLabel {
    Affected,
    NotAffected,
}

impl StrokeLabel {
    pub fn from_class(class: i32) -> Self {
        if class == 1 {
            StrokeLabel::Affected
        } else {
            StrokeLabel::NotAffected
        }
    }

    pub fn at_risk(&self) -> bool {
        *self == StrokeLabel::Affected
    }
}

impl fmt::Display for StrokeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrokeLabel::Affected => f.write_str("Affected by Stroke"),
            StrokeLabel::NotAffected => f.write_str("Not Affected by Stroke"),
        }
    }
}

/// Whether the caller wants the positive-class probability alongside the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    LabelOnly,
    WithProbability,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: StrokeLabel,
    pub probability: Option<f64>,
}

/// Transforms and classifies one record. The classifier is not consulted
/// unless the record encodes cleanly.
pub fn classify(
    artifact: &ModelArtifact,
    record: &Record,
    confidence: Confidence,
) -> Result<Prediction, ServeError> {
    let features = artifact.features(record)?;
    let probability = artifact.classifier.predict_proba(&features)?;
    Ok(Prediction {
        label: StrokeLabel::from_class(label_for(probability)),
        probability: match confidence {
            Confidence::WithProbability => Some(probability),
            Confidence::LabelOnly => None,
        },
    })
}

#[derive(Debug, Clone, Default)]
pub enum ModelState {
    #[default]
    NotInitialized,
    Ready(Arc<ModelArtifact>),
}

/// Shared, read-only access to the current model.
#[derive(Debug)]
pub struct ArtifactHandle {
    path: PathBuf,
    state: RwLock<ModelState>,
}

impl ArtifactHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(ModelState::NotInitialized),
        }
    }

    /// A handle that is ready without touching disk.
    pub fn with_artifact(path: impl Into<PathBuf>, artifact: ModelArtifact) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(ModelState::Ready(Arc::new(artifact))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.snapshot(), ModelState::Ready(_))
    }

    fn snapshot(&self) -> ModelState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, state: ModelState) {
        match self.state.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// Returns the current model, loading it from disk on first use. A failed
    /// load leaves the handle uninitialised so a later call can retry.
    pub fn ensure_loaded(&self) -> Result<Arc<ModelArtifact>, ArtifactError> {
        if let ModelState::Ready(artifact) = self.snapshot() {
            return Ok(artifact);
        }
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let ModelState::Ready(artifact) = &*guard {
            return Ok(Arc::clone(artifact));
        }
        let artifact = Arc::new(ModelArtifact::load(&self.path)?);
        log::info!("model loaded from {:?}", self.path);
        *guard = ModelState::Ready(Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Swaps in a freshly trained model. Calls already holding the previous
    /// `Arc` finish against it.
    pub fn replace(&self, artifact: ModelArtifact) {
        self.store(ModelState::Ready(Arc::new(artifact)));
    }

    /// Re-reads the artifact from disk. On failure the current model stays.
    pub fn reload(&self) -> Result<(), ArtifactError> {
        let artifact = ModelArtifact::load(&self.path)?;
        self.replace(artifact);
        log::info!("model reloaded from {:?}", self.path);
        Ok(())
    }
}

/// Entry point used by every front end.
#[derive(Debug, Clone)]
pub struct StrokeService {
    handle: Arc<ArtifactHandle>,
}

impl StrokeService {
    pub fn new(handle: Arc<ArtifactHandle>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Arc<ArtifactHandle> {
        &self.handle
    }

    pub fn predict(&self, record: &Record, confidence: Confidence) -> Result<Prediction, ServeError> {
        let artifact = self.handle.ensure_loaded()?;
        let prediction = classify(&artifact, record, confidence)?;
        log::debug!("prediction: {} ({:?})", prediction.label, prediction.probability);
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_render_as_user_text() {
        assert_eq!(StrokeLabel::from_class(1).to_string(), "Affected by Stroke");
        assert_eq!(StrokeLabel::from_class(0).to_string(), "Not Affected by Stroke");
        assert!(StrokeLabel::Affected.at_risk());
    }

    #[test]
    fn unseen_category_keeps_its_own_variant() {
        let err: ServeError = RecordError::UnseenCategory {
            field: "work_type".into(),
            value: "Retired".into(),
        }
        .into();
        assert!(matches!(err, ServeError::UnseenCategory { .. }));

        let err: ServeError = RecordError::MissingField {
            field: "bmi".into(),
        }
        .into();
        assert!(matches!(err, ServeError::MalformedRecord(_)));
    }

    #[test]
    fn missing_artifact_means_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let handle = Arc::new(ArtifactHandle::new(dir.path().join("model.json")));
        let service = StrokeService::new(Arc::clone(&handle));
        let err = service
            .predict(&Record::new(), Confidence::LabelOnly)
            .unwrap_err();
        assert!(matches!(
            err,
            ServeError::ModelNotReady(ArtifactError::Missing { .. })
        ));
        assert!(!handle.is_ready());
    }
}
