use burn::prelude::Backend;
use serde::{Deserialize, Serialize};

use crate::acceleration::{AccelerationConfig, probe_acceleration};
use crate::config::HandlerConfig;
use crate::context::DeploymentContext;
use crate::probe::{AcceleratorProfile, HostProbe};

/// Compute target a model is placed on, independent of the burn backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ComputeDevice {
    #[display("cpu")]
    Cpu,
    #[display("gpu:{_0}")]
    Gpu(usize),
    #[display("accelerated_cpu({})", _0.library)]
    Accelerated(AcceleratorProfile),
}

impl ComputeDevice {
    pub fn is_cpu(&self) -> bool {
        matches!(self, ComputeDevice::Cpu)
    }
}

/// Selects the accelerator when the host has one, the CPU otherwise.
///
/// The index is `gpu_id` when given, `default_index` otherwise.
pub fn resolve_device(
    probe: &dyn HostProbe,
    gpu_id: Option<usize>,
    default_index: usize,
) -> ComputeDevice {
    if probe.accelerator_count() > 0 {
        ComputeDevice::Gpu(gpu_id.unwrap_or(default_index))
    } else {
        ComputeDevice::Cpu
    }
}

/// Device resolution followed by the CPU acceleration probe.
///
/// Returns the target to place the model on and, when the accelerated CPU path
/// was taken, the settings the runtime should apply.
pub fn resolve_target(
    probe: &dyn HostProbe,
    ctx: &DeploymentContext,
    config: &HandlerConfig,
) -> (ComputeDevice, Option<AccelerationConfig>) {
    let device = resolve_device(probe, ctx.gpu_id(), config.default_gpu_index);
    if device.is_cpu() {
        cpu_target(probe, config)
    } else {
        (device, None)
    }
}

/// CPU target, accelerated when the probe succeeds.
pub fn cpu_target(
    probe: &dyn HostProbe,
    config: &HandlerConfig,
) -> (ComputeDevice, Option<AccelerationConfig>) {
    match probe_acceleration(probe, &config.acceleration) {
        Some(acceleration) => (
            ComputeDevice::Accelerated(acceleration.profile.clone()),
            Some(acceleration),
        ),
        None => (ComputeDevice::Cpu, None),
    }
}

/// Maps a [`ComputeDevice`] to a concrete device of backend `B`.
///
/// Returns `None` when the backend cannot place a model on that target.
pub trait DeviceMapper<B: Backend> {
    fn map(&self, device: &ComputeDevice) -> Option<B::Device>;
}

impl<B, F> DeviceMapper<B> for F
where
    B: Backend,
    F: Fn(&ComputeDevice) -> Option<B::Device>,
{
    fn map(&self, device: &ComputeDevice) -> Option<B::Device> {
        self(device)
    }
}

/// Places CPU targets on the backend's default device and rejects accelerators.
///
/// Fits single-device backends such as `NdArray`, where the default device is
/// the CPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDeviceMapper;

impl<B: Backend> DeviceMapper<B> for DefaultDeviceMapper {
    fn map(&self, device: &ComputeDevice) -> Option<B::Device> {
        match device {
            ComputeDevice::Cpu | ComputeDevice::Accelerated(_) => Some(B::Device::default()),
            ComputeDevice::Gpu(_) => None,
        }
    }
}

#[cfg(feature = "wgpu")]
mod wgpu {
    use super::{ComputeDevice, DeviceMapper};
    use burn::backend::wgpu::{Wgpu, WgpuDevice};

    /// Maps accelerator indices onto discrete `wgpu` adapters.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct WgpuDeviceMapper;

    impl DeviceMapper<Wgpu> for WgpuDeviceMapper {
        fn map(&self, device: &ComputeDevice) -> Option<WgpuDevice> {
            Some(match device {
                ComputeDevice::Gpu(index) => WgpuDevice::DiscreteGpu(*index),
                ComputeDevice::Cpu | ComputeDevice::Accelerated(_) => WgpuDevice::Cpu,
            })
        }
    }
}

#[cfg(feature = "wgpu")]
pub use wgpu::WgpuDeviceMapper;
