pub mod artifact;
pub mod batch;
pub mod config;
pub mod corpus;
pub mod encoder;
pub mod forest;
pub mod imputer;
pub mod interactive;
pub mod pipeline;
pub mod records;
pub mod serving;
pub mod training;

pub use artifact::{ArtifactError, ModelArtifact};
pub use encoder::{CategoricalEncoder, UnseenPolicy, FALLBACK_CATEGORY};
pub use pipeline::FeaturePipeline;
pub use records::{FeatureVector, RawValue, Record, RecordError, FEATURE_LAYOUT};
pub use serving::{
    ArtifactHandle, Confidence, Prediction, ServeError, StrokeLabel, StrokeService,
};
pub use training::{train, TrainingError, TrainingOptions, TrainingReport};
