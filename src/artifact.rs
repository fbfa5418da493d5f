//! The trained model bundle and its on-disk form.
//!
//! A `ModelArtifact` is written as a single JSON document. Saving goes through
//! a sibling temp file and a rename, so a crash mid-write leaves any previous
//! artifact at the target path intact.

use crate::forest::BaggedForest;
use crate::pipeline::FeaturePipeline;
use crate::records::{feature_names, FeatureVector, Record, RecordError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("no trained model at {path:?}; run training first")]
    Missing { path: PathBuf },
    #[error("failed to read or write model file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model file {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize model: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("model file {path:?} is incomplete: {reason}")]
    Incomplete { path: PathBuf, reason: String },
    #[error("model was trained on features {found:?}, this build expects {expected:?}")]
    LayoutMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub crate_version: String,
    /// Column order the classifier was fitted with.
    pub feature_order: Vec<String>,
    pub training_rows: usize,
    pub positive_rows: usize,
}

/// Classifier plus the fitted pipeline state needed to reproduce its inputs.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ArtifactMetadata,
    pub pipeline: FeaturePipeline,
    pub classifier: BaggedForest,
}

impl ModelArtifact {
    pub fn new(
        pipeline: FeaturePipeline,
        classifier: BaggedForest,
        training_rows: usize,
        positive_rows: usize,
    ) -> Self {
        Self {
            metadata: ArtifactMetadata {
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
                feature_order: feature_names(),
                training_rows,
                positive_rows,
            },
            pipeline,
            classifier,
        }
    }

    pub fn features(&self, record: &Record) -> Result<FeatureVector, RecordError> {
        self.pipeline.transform(record)
    }

    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let io_err = |source: std::io::Error| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = temp_path(path);
        let written = (|| {
            let file = fs::File::create(&tmp).map_err(io_err)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self).map_err(ArtifactError::Serialize)?;
            writer.flush().map_err(io_err)?;
            writer.get_ref().sync_all().map_err(io_err)?;
            fs::rename(&tmp, path).map_err(io_err)
        })();
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written?;

        log::info!("model artifact written to {:?}", path);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::Missing {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(ArtifactError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let artifact: ModelArtifact =
            serde_json::from_str(&text).map_err(|source| ArtifactError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        let expected = feature_names();
        if artifact.metadata.feature_order != expected {
            return Err(ArtifactError::LayoutMismatch {
                expected,
                found: artifact.metadata.feature_order,
            });
        }
        let incomplete = |reason: String| ArtifactError::Incomplete {
            path: path.to_path_buf(),
            reason,
        };
        if artifact.classifier.n_trees() == 0 {
            return Err(incomplete("classifier has no trees".to_string()));
        }
        if let Some(field) = artifact.pipeline.incomplete_field() {
            return Err(incomplete(format!("no valid encoder for '{field}'")));
        }
        log::debug!(
            "loaded model trained on {} rows ({} positive)",
            artifact.metadata.training_rows,
            artifact.metadata.positive_rows
        );
        Ok(artifact)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "model".into());
    name.push(".tmp");
    path.with_file_name(name)
}
