use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;

/// Environment variable that disables automatic mixed precision on the
/// accelerated CPU path when set to any value.
pub const DISABLE_MIXED_PRECISION_ENV: &str = "IPEX_DISABLE_MIXED_PRECISION";

/// Default name of the class-index to label file inside the model directory.
pub const DEFAULT_LABEL_MAPPING_FILE: &str = "index_to_name.json";

/// Default shared library probed for CPU mixed-precision acceleration.
pub const DEFAULT_ACCELERATION_LIBRARY: &str = "libintel-ext-pt-cpu.so";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Accelerator index used when the context carries no `gpu_id`.
    pub default_gpu_index: usize,
    pub label_mapping_file: String,
    pub acceleration: AccelerationSettings,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            default_gpu_index: 0,
            label_mapping_file: DEFAULT_LABEL_MAPPING_FILE.to_string(),
            acceleration: AccelerationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelerationSettings {
    /// Whether the CPU acceleration probe runs at all.
    pub enabled: bool,
    pub library_name: String,
    pub disable_mixed_precision: bool,
}

impl Default for AccelerationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            library_name: DEFAULT_ACCELERATION_LIBRARY.to_string(),
            disable_mixed_precision: false,
        }
    }
}

impl HandlerConfig {
    /// Defaults with overrides read from the process environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var_os(key).map(|_| String::new()))
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if lookup(DISABLE_MIXED_PRECISION_ENV).is_some() {
            self.acceleration.disable_mixed_precision = true;
        }
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self, HandlerError> {
        toml::from_str(s).map_err(|e| HandlerError::InvalidConfig(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, HandlerError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| HandlerError::io(path, e))?;
        Self::from_toml_str(&contents)
    }
}
