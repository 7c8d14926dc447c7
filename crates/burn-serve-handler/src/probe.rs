//! Host capability probes.
//!
//! Initialization never inspects the host directly; it asks a [`HostProbe`].
//! [`SystemProbe`] reads the real machine, tests substitute their own.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory the NVIDIA kernel driver populates with one entry per GPU.
const NVIDIA_GPUS_DIR: &str = "/proc/driver/nvidia/gpus";

/// Library directories searched after `LD_LIBRARY_PATH`.
const LIBRARY_DIRS: &[&str] = &["/usr/local/lib", "/usr/lib", "/usr/lib64"];

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to run '{command}': {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' exited with {status}")]
    CommandStatus { command: String, status: String },
    #[error("Failed to parse CPU topology: {0}")]
    Topology(String),
}

/// A CPU acceleration library found on the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcceleratorProfile {
    pub library: String,
    pub path: PathBuf,
}

pub trait HostProbe {
    /// Number of accelerators usable by this process.
    fn accelerator_count(&self) -> usize;

    /// Locates the named acceleration library, `None` when it is not installed.
    fn acceleration_library(&self, library: &str) -> Option<AcceleratorProfile>;

    /// Raw `lscpu`-style topology description of the host.
    fn cpu_topology(&self) -> Result<String, ProbeError>;
}

/// Probes the machine the process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn accelerator_count(&self) -> usize {
        if let Some(visible) = std::env::var_os("CUDA_VISIBLE_DEVICES") {
            let visible = visible.to_string_lossy();
            let visible = visible.trim();
            if visible.is_empty() || visible == "-1" {
                return 0;
            }
        }
        std::fs::read_dir(NVIDIA_GPUS_DIR)
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }

    fn acceleration_library(&self, library: &str) -> Option<AcceleratorProfile> {
        let from_env = std::env::var_os("LD_LIBRARY_PATH")
            .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
            .unwrap_or_default();
        let defaults = LIBRARY_DIRS.iter().map(PathBuf::from);

        from_env
            .into_iter()
            .chain(defaults)
            .map(|dir| dir.join(library))
            .find(|candidate| candidate.is_file())
            .map(|path| AcceleratorProfile {
                library: library.to_string(),
                path,
            })
    }

    fn cpu_topology(&self) -> Result<String, ProbeError> {
        run_command(Path::new("lscpu"))
    }
}

fn run_command(program: &Path) -> Result<String, ProbeError> {
    let command = program.display().to_string();
    let output = Command::new(program)
        .output()
        .map_err(|source| ProbeError::Command {
            command: command.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(ProbeError::CommandStatus {
            command,
            status: output.status.to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_command_is_a_probe_error() {
        let err = run_command(Path::new("/nonexistent/lscpu")).unwrap_err();
        assert!(matches!(err, ProbeError::Command { .. }));
    }

    #[test]
    fn unknown_library_is_not_found() {
        assert!(
            SystemProbe
                .acceleration_library("libdefinitely-not-installed-accel.so")
                .is_none()
        );
    }
}
