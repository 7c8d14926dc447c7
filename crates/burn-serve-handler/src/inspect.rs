use std::path::PathBuf;

use serde::Serialize;

use crate::acceleration::AccelerationConfig;
use crate::config::HandlerConfig;
use crate::context::{DeploymentContext, Manifest};
use crate::device::{ComputeDevice, resolve_target};
use crate::error::HandlerError;
use crate::labels::load_label_mapping;
use crate::package::{ModelDefinition, ModelFormat, resolve_package};
use crate::probe::HostProbe;

/// What initialization would do with a model directory, minus loading the
/// weights.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageReport {
    pub model_dir: PathBuf,
    pub manifest: Manifest,
    pub artifact_path: PathBuf,
    pub artifact_bytes: u64,
    pub format: &'static str,
    pub definition_path: Option<PathBuf>,
    pub definition: Option<ModelDefinition>,
    pub device: ComputeDevice,
    pub acceleration: Option<AccelerationConfig>,
    pub labels: Option<usize>,
}

/// Runs the same resolution steps as
/// [`BaseHandler::initialize`](crate::BaseHandler::initialize) and reports the
/// outcome. Fails with the error initialization would fail with.
///
/// No backend is involved, so the reported device is the resolved target
/// before any device mapper is consulted.
pub fn inspect(
    ctx: &DeploymentContext,
    config: &HandlerConfig,
    probe: &dyn HostProbe,
) -> Result<PackageReport, HandlerError> {
    let (device, acceleration) = resolve_target(probe, ctx, config);

    let package = resolve_package(ctx)?;
    let artifact_bytes = std::fs::metadata(&package.artifact_path)
        .map_err(|e| HandlerError::io(&package.artifact_path, e))?
        .len();
    let (format, definition_path, definition) = match package.format {
        ModelFormat::Eager {
            definition_path,
            definition,
        } => ("eager", Some(definition_path), Some(definition)),
        ModelFormat::Compiled => ("compiled", None, None),
    };

    let labels = load_label_mapping(ctx.model_dir(), &config.label_mapping_file)?
        .map(|labels| labels.len());

    Ok(PackageReport {
        model_dir: ctx.model_dir().to_path_buf(),
        manifest: ctx.manifest.clone(),
        artifact_path: package.artifact_path,
        artifact_bytes,
        format,
        definition_path,
        definition,
        device,
        acceleration,
        labels,
    })
}
