use crate::encoder::UnseenPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CORPUS_PATH: &str = "data/healthcare-dataset-stroke-data.csv";
pub const DEFAULT_ARTIFACT_PATH: &str = "models/stroke_model.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// File-level settings. Every key is optional; CLI flags override them.
///
/// ```toml
/// corpus_path = "data/healthcare-dataset-stroke-data.csv"
/// artifact_path = "models/stroke_model.json"
/// unseen_policy = "remap"   # or "reject"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrokeConfig {
    pub corpus_path: PathBuf,
    pub artifact_path: PathBuf,
    pub unseen_policy: UnseenPolicy,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from(DEFAULT_CORPUS_PATH),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            unseen_policy: UnseenPolicy::default(),
        }
    }
}

impl StrokeConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: StrokeConfig = toml::from_str(r#"unseen_policy = "reject""#).unwrap();
        assert_eq!(config.unseen_policy, UnseenPolicy::Reject);
        assert_eq!(config.artifact_path, PathBuf::from(DEFAULT_ARTIFACT_PATH));
    }

    #[test]
    fn unknown_keys_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stroke.toml");
        fs::write(&path, "n_trees = 500\n").unwrap();
        assert!(matches!(
            StrokeConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn no_file_means_defaults() {
        assert_eq!(StrokeConfig::load(None).unwrap(), StrokeConfig::default());
    }
}
