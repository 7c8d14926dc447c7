//! Best-effort CPU acceleration.
//!
//! On hosts without an accelerator the handler looks for a mixed-precision
//! acceleration library. When it is installed the handler switches to it and
//! computes the OpenMP affinity hint from the host topology. Nothing here can
//! fail initialization: a probe that cannot complete yields `None`.
//!
//! The process environment is never written implicitly; the runtime decides
//! whether to call [`AccelerationConfig::apply_to_process`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::AccelerationSettings;
use crate::probe::{AcceleratorProfile, HostProbe, ProbeError};

/// OpenMP affinity variable the hint is meant for.
pub const AFFINITY_ENV: &str = "KMP_AFFINITY";

/// Affinity when each physical core runs a single hardware thread.
pub const AFFINITY_SINGLE_THREAD: &str = "granularity=fine,verbose,compact";

/// Affinity when hyperthreading is detected.
pub const AFFINITY_HYPERTHREADED: &str = "granularity=fine,verbose,compact,1,0";

/// Last token of the first `lscpu` line mentioning "per core".
static PER_CORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^.*per core.*?(\S+)[ \t]*$").expect("per-core pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccelerationConfig {
    pub profile: AcceleratorProfile,
    /// Whether the runtime should enable automatic mixed precision. There is no
    /// environment variable for it, so runtimes read this field directly.
    pub auto_mixed_precision: bool,
    /// `None` when the topology could not be read or lists no per-core figure.
    pub threads_per_core: Option<usize>,
    pub affinity: String,
}

impl AccelerationConfig {
    /// Environment variables the runtime should export for this configuration.
    ///
    /// Only the affinity hint is an environment variable;
    /// [`auto_mixed_precision`](Self::auto_mixed_precision) is not part of the list.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        vec![(AFFINITY_ENV, self.affinity.clone())]
    }

    /// Exports [`env_vars`](Self::env_vars) into the current process.
    ///
    /// Must be called before the runtime spawns worker threads.
    pub fn apply_to_process(&self) {
        for (key, value) in self.env_vars() {
            // SAFETY: callers apply the configuration once at startup, before any
            // other thread reads the environment.
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Affinity profile for the given number of hardware threads per core.
///
/// An unknown topology is treated as hyperthreaded.
pub fn affinity_for(threads_per_core: Option<usize>) -> &'static str {
    if threads_per_core == Some(1) {
        AFFINITY_SINGLE_THREAD
    } else {
        AFFINITY_HYPERTHREADED
    }
}

/// Extracts the threads-per-core figure from `lscpu` output.
///
/// Returns `Ok(None)` when no line mentions "per core" and an error when the
/// figure on that line is not a number.
pub fn parse_threads_per_core(lscpu: &str) -> Result<Option<usize>, ProbeError> {
    let Some(captures) = PER_CORE.captures(lscpu) else {
        return Ok(None);
    };
    captures[1]
        .parse::<usize>()
        .map(Some)
        .map_err(|e| ProbeError::Topology(format!("'{}': {e}", &captures[1])))
}

/// Runs the acceleration probe.
///
/// Returns `None` when acceleration is disabled, when the library is absent
/// and when the topology reports a malformed per-core figure. A topology that
/// cannot be read at all keeps acceleration with the hyperthreaded profile.
pub fn probe_acceleration(
    probe: &dyn HostProbe,
    settings: &AccelerationSettings,
) -> Option<AccelerationConfig> {
    if !settings.enabled {
        return None;
    }
    let Some(profile) = probe.acceleration_library(&settings.library_name) else {
        log::debug!(
            "Acceleration library '{}' not found, staying on plain CPU",
            settings.library_name
        );
        return None;
    };

    match detect_threads_per_core(probe) {
        Ok(threads_per_core) => {
            let config = AccelerationConfig {
                profile,
                auto_mixed_precision: !settings.disable_mixed_precision,
                threads_per_core,
                affinity: affinity_for(threads_per_core).to_string(),
            };
            log::debug!("CPU acceleration enabled: {config:?}");
            Some(config)
        }
        Err(e) => {
            log::debug!("Ignoring CPU acceleration, unreadable topology: {e}");
            None
        }
    }
}

fn detect_threads_per_core(probe: &dyn HostProbe) -> Result<Option<usize>, ProbeError> {
    match probe.cpu_topology() {
        Ok(lscpu) => parse_threads_per_core(&lscpu),
        Err(e) => {
            log::debug!("CPU topology unavailable, assuming hyperthreading: {e}");
            Ok(None)
        }
    }
}
