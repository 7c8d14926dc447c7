use std::path::PathBuf;

use burn::record::RecorderError;
use thiserror::Error;

use crate::handler::Stage;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Missing serialized model artifact at '{}'", path.display())]
    MissingArtifact { path: PathBuf },
    #[error("Expected exactly one model definition in '{}', found {}: {candidates:?}", path.display(), candidates.len())]
    AmbiguousModelDefinition {
        path: PathBuf,
        candidates: Vec<String>,
    },
    #[error("No constructor registered for model '{name}'. Registered models: {registered:?}")]
    UnknownModel {
        name: String,
        registered: Vec<String>,
    },
    #[error("Unsupported artifact format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Invalid model definition file '{}': {reason}", path.display())]
    InvalidDefinition { path: PathBuf, reason: String },
    #[error("Invalid handler configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to load model artifact: {0}")]
    ArtifactLoad(String),
    #[error("Failed to decode model record: {0}")]
    Recorder(#[from] RecorderError),
    #[error("Model construction failed: {0}")]
    ModelConstruction(anyhow::Error),
    #[error("Invalid label mapping '{}': {reason}", path.display())]
    LabelMapping { path: PathBuf, reason: String },
    #[error("Backend '{0}' tracks gradients; serve models with a non-autodiff backend")]
    AutodiffBackend(String),
    #[error("Device mapper cannot place the model on {0}")]
    UnsupportedDevice(String),
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Handler has not been initialized")]
    Uninitialized,
    #[error("Handler is already initialized")]
    AlreadyInitialized,
    #[error("Handler initialization failed previously; this instance cannot serve requests")]
    Failed,
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl HandlerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HandlerError::Io {
            path: path.into(),
            source,
        }
    }
}
