//! Deployment context handed to a handler by the serving runtime.
//!
//! The context pairs the packaged model's manifest with the properties of the
//! worker that is about to load it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;

/// Location of the manifest inside a packaged model directory.
pub const MANIFEST_PATH: &str = "MAR-INF/MANIFEST.json";

/// Metadata describing a packaged model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub model: ModelSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
}

/// The `model` section of a [`Manifest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSection {
    /// File name of the serialized artifact, relative to the model directory.
    pub serialized_file: String,
    /// Optional model-definition file, relative to the model directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
}

impl Manifest {
    /// Manifest with only the required serialized file set.
    pub fn new(serialized_file: impl Into<String>) -> Self {
        Self {
            model: ModelSection {
                serialized_file: serialized_file.into(),
                ..Default::default()
            },
            runtime: None,
            created_on: None,
        }
    }

    pub fn with_model_file(mut self, model_file: impl Into<String>) -> Self {
        self.model.model_file = Some(model_file.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, HandlerError> {
        let manifest: Manifest =
            serde_json::from_str(json).map_err(|e| HandlerError::InvalidManifest(e.to_string()))?;
        if manifest.model.serialized_file.trim().is_empty() {
            return Err(HandlerError::InvalidManifest(
                "model.serializedFile must not be empty".to_string(),
            ));
        }
        Ok(manifest)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, HandlerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| HandlerError::io(path, e))?;
        Self::from_json_str(&json)
    }
}

/// Properties of the worker process the model is loaded into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemProperties {
    pub model_dir: PathBuf,
    #[serde(default)]
    pub gpu_id: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentContext {
    pub manifest: Manifest,
    pub system_properties: SystemProperties,
}

impl DeploymentContext {
    pub fn new(manifest: Manifest, model_dir: impl Into<PathBuf>, gpu_id: Option<usize>) -> Self {
        Self {
            manifest,
            system_properties: SystemProperties {
                model_dir: model_dir.into(),
                gpu_id,
            },
        }
    }

    /// Builds a context from a packaged model directory, reading its manifest
    /// from [`MANIFEST_PATH`].
    pub fn from_model_dir(
        model_dir: impl Into<PathBuf>,
        gpu_id: Option<usize>,
    ) -> Result<Self, HandlerError> {
        let model_dir = model_dir.into();
        let manifest = Manifest::from_path(model_dir.join(MANIFEST_PATH))?;
        Ok(Self::new(manifest, model_dir, gpu_id))
    }

    pub fn model_dir(&self) -> &Path {
        &self.system_properties.model_dir
    }

    pub fn gpu_id(&self) -> Option<usize> {
        self.system_properties.gpu_id
    }
}
