//! Resolution of a packaged model directory.
//!
//! Finds the serialized artifact and decides how it is loaded: through a
//! model-definition file naming the model to construct, or as a
//! self-contained compiled artifact.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::DeploymentContext;
use crate::error::HandlerError;

/// One model declared in a model-definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Constructor arguments, typically a serialized burn `Config`.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Set when the entry re-exports a definition from another package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_from: Option<String>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            config: serde_json::Value::Null,
            imported_from: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// `name@version`, or `name` when unversioned.
    pub fn id(&self) -> String {
        match &self.version {
            Some(version) => format!("{}@{version}", self.name),
            None => self.name.clone(),
        }
    }

    /// Whether the entry is declared by this file rather than re-exported.
    pub fn is_local(&self) -> bool {
        self.imported_from.is_none()
    }
}

/// Contents of a model-definition file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionFile {
    #[serde(default)]
    pub definitions: Vec<ModelDefinition>,
}

impl DefinitionFile {
    /// Reads a definition file, as TOML when the extension is `.toml` and as
    /// JSON otherwise.
    pub fn from_path(path: &Path) -> Result<Self, HandlerError> {
        let contents = std::fs::read_to_string(path).map_err(|e| HandlerError::io(path, e))?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let parsed = if is_toml {
            toml::from_str(&contents).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| HandlerError::InvalidDefinition {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// The single locally declared definition.
    pub fn single_definition(self, path: &Path) -> Result<ModelDefinition, HandlerError> {
        let mut local: Vec<ModelDefinition> = self
            .definitions
            .into_iter()
            .filter(ModelDefinition::is_local)
            .collect();
        if local.len() != 1 {
            return Err(HandlerError::AmbiguousModelDefinition {
                path: path.to_path_buf(),
                candidates: local.iter().map(ModelDefinition::id).collect(),
            });
        }
        Ok(local.remove(0))
    }
}

/// How the serialized artifact is turned into a model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelFormat {
    /// Construct the model named by the definition file, then load the
    /// artifact's parameter record onto it.
    Eager {
        definition_path: PathBuf,
        definition: ModelDefinition,
    },
    /// The artifact carries both configuration and weights.
    Compiled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPackage {
    pub artifact_path: PathBuf,
    pub format: ModelFormat,
}

/// `<model_dir>/<serializedFile>`, which must be a regular file.
pub fn resolve_artifact(ctx: &DeploymentContext) -> Result<PathBuf, HandlerError> {
    let path = ctx.model_dir().join(&ctx.manifest.model.serialized_file);
    if !path.is_file() {
        return Err(HandlerError::MissingArtifact { path });
    }
    Ok(path)
}

pub fn resolve_format(ctx: &DeploymentContext) -> Result<ModelFormat, HandlerError> {
    let definition_path = ctx
        .manifest
        .model
        .model_file
        .as_deref()
        .filter(|file| !file.is_empty())
        .map(|file| ctx.model_dir().join(file))
        .filter(|path| path.is_file());

    match definition_path {
        Some(definition_path) => {
            let definition =
                DefinitionFile::from_path(&definition_path)?.single_definition(&definition_path)?;
            log::debug!(
                "Using model definition '{}' from {}",
                definition.id(),
                definition_path.display()
            );
            Ok(ModelFormat::Eager {
                definition_path,
                definition,
            })
        }
        None => {
            log::debug!("No model definition file found, loading a compiled artifact");
            Ok(ModelFormat::Compiled)
        }
    }
}

pub fn resolve_package(ctx: &DeploymentContext) -> Result<ResolvedPackage, HandlerError> {
    let artifact_path = resolve_artifact(ctx)?;
    let format = resolve_format(ctx)?;
    Ok(ResolvedPackage {
        artifact_path,
        format,
    })
}
