use std::path::PathBuf;

use clap::Parser;

use crate::config::HandlerConfig;
use crate::context::{DeploymentContext, MANIFEST_PATH, Manifest};
use crate::error::HandlerError;

#[derive(Parser, Debug)]
#[command(
    name = "burn-serve-inspect",
    version,
    about = "Validate a packaged Burn model directory"
)]
pub struct HandlerArgs {
    /// Directory holding the serialized artifact and its companion files.
    pub model_dir: PathBuf,
    #[arg(long)]
    pub gpu_id: Option<usize>,
    /// Manifest file, relative to the model directory unless absolute.
    #[arg(long, default_value = MANIFEST_PATH)]
    pub manifest: PathBuf,
    /// TOML handler configuration. Defaults plus environment overrides when absent.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl HandlerArgs {
    pub fn into_context(self) -> Result<(DeploymentContext, HandlerConfig), HandlerError> {
        let config = match &self.config {
            Some(path) => HandlerConfig::from_path(path)?,
            None => HandlerConfig::default(),
        }
        .with_env_overrides(|key| std::env::var(key).ok());
        let manifest = Manifest::from_path(self.model_dir.join(&self.manifest))?;
        let ctx = DeploymentContext::new(manifest, self.model_dir, self.gpu_id);
        Ok((ctx, config))
    }
}

pub fn parse_handler_args() -> HandlerArgs {
    HandlerArgs::parse()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_parse_handler_args() {
        let args = vec!["burn-serve-inspect", "/models/resnet", "--gpu-id", "1"];
        let handler_args = HandlerArgs::try_parse_from(args).unwrap();
        assert_eq!(handler_args.model_dir, PathBuf::from("/models/resnet"));
        assert_eq!(handler_args.gpu_id, Some(1));
        assert_eq!(handler_args.manifest, PathBuf::from(MANIFEST_PATH));
        assert!(handler_args.config.is_none());
    }

    #[test]
    fn test_args_into_context() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{"model": {"serializedFile": "model.pt"}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("handler.toml"),
            "default_gpu_index = 3\nlabel_mapping_file = \"labels.json\"\n",
        )
        .unwrap();
        let config_path = dir.path().join("handler.toml");

        let args = HandlerArgs::try_parse_from([
            OsStr::new("burn-serve-inspect"),
            dir.path().as_os_str(),
            OsStr::new("--manifest"),
            OsStr::new("manifest.json"),
            OsStr::new("--config"),
            config_path.as_os_str(),
        ])
        .unwrap();
        let (ctx, config) = args.into_context().unwrap();

        assert_eq!(ctx.manifest.model.serialized_file, "model.pt");
        assert_eq!(ctx.model_dir(), dir.path());
        assert_eq!(ctx.gpu_id(), None);
        assert_eq!(config.default_gpu_index, 3);
        assert_eq!(config.label_mapping_file, "labels.json");
    }
}
