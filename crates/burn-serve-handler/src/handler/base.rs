use burn::module::Module;
use burn::prelude::Backend;

use crate::acceleration::AccelerationConfig;
use crate::config::HandlerConfig;
use crate::context::{DeploymentContext, Manifest};
use crate::device::{
    ComputeDevice, DefaultDeviceMapper, DeviceMapper, cpu_target, resolve_target,
};
use crate::error::HandlerError;
use crate::factory::ModelFactory;
use crate::labels::{LabelMapping, load_label_mapping};
use crate::model::ModelHandle;
use crate::package::{ModelFormat, resolve_package};
use crate::probe::{HostProbe, SystemProbe};
use crate::state::HandlerState;

/// Everything `initialize` produces. Present only once the handler is
/// initialized.
pub(crate) struct Loaded<B: Backend, M> {
    pub manifest: Manifest,
    pub device: ComputeDevice,
    pub model: ModelHandle<B, M>,
    pub labels: Option<LabelMapping>,
    pub acceleration: Option<AccelerationConfig>,
}

/// Loads a packaged model and owns it for the lifetime of the worker.
pub struct BaseHandler<B: Backend, M> {
    state: HandlerState,
    config: HandlerConfig,
    factory: ModelFactory<B, M>,
    probe: Box<dyn HostProbe + Send + Sync>,
    devices: Box<dyn DeviceMapper<B> + Send + Sync>,
    loaded: Option<Loaded<B, M>>,
}

impl<B: Backend, M: Module<B>> BaseHandler<B, M> {
    pub fn new(factory: ModelFactory<B, M>) -> Self {
        Self {
            state: HandlerState::Uninitialized,
            config: HandlerConfig::from_env(),
            factory,
            probe: Box::new(SystemProbe),
            devices: Box::new(DefaultDeviceMapper),
            loaded: None,
        }
    }

    pub fn with_config(mut self, config: HandlerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_probe(mut self, probe: impl HostProbe + Send + Sync + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_device_mapper(
        mut self,
        devices: impl DeviceMapper<B> + Send + Sync + 'static,
    ) -> Self {
        self.devices = Box::new(devices);
        self
    }

    /// Loads the model described by `ctx`. Callable once.
    ///
    /// On error the handler moves to [`HandlerState::Failed`] and can no longer
    /// serve; the error is returned unchanged.
    pub fn initialize(&mut self, ctx: &DeploymentContext) -> Result<(), HandlerError> {
        self.state.ensure_initializable()?;

        match self.load(ctx) {
            Ok(loaded) => {
                log::info!(
                    "Handler initialized: {} on {}",
                    loaded.model.model_type(),
                    loaded.device
                );
                self.loaded = Some(loaded);
                self.state = HandlerState::Initialized;
                Ok(())
            }
            Err(e) => {
                log::error!(
                    "Failed to initialize handler for {}: {e}",
                    ctx.model_dir().display()
                );
                self.state = HandlerState::Failed;
                Err(e)
            }
        }
    }

    fn load(&self, ctx: &DeploymentContext) -> Result<Loaded<B, M>, HandlerError> {
        if B::ad_enabled() {
            return Err(HandlerError::AutodiffBackend(tynm::type_name::<B>()));
        }

        let (mut device, mut acceleration) =
            resolve_target(self.probe.as_ref(), ctx, &self.config);
        let backend_device = match self.devices.map(&device) {
            Some(backend_device) => backend_device,
            None => {
                log::warn!(
                    "Device mapper cannot place the model on {device}, falling back to the CPU"
                );
                (device, acceleration) = cpu_target(self.probe.as_ref(), &self.config);
                self.devices
                    .map(&device)
                    .ok_or_else(|| HandlerError::UnsupportedDevice(device.to_string()))?
            }
        };
        log::debug!("Resolved device {device} ({backend_device:?})");

        let package = resolve_package(ctx)?;
        let model = match &package.format {
            ModelFormat::Eager { definition, .. } => {
                self.factory
                    .load_eager(definition, &package.artifact_path, &backend_device)?
            }
            ModelFormat::Compiled => self
                .factory
                .load_compiled_path(&package.artifact_path, &backend_device)?,
        };
        let model = ModelHandle::new(model, backend_device);
        log::debug!(
            "Model file {} loaded successfully",
            package.artifact_path.display()
        );

        let labels = load_label_mapping(ctx.model_dir(), &self.config.label_mapping_file)?;

        Ok(Loaded {
            manifest: ctx.manifest.clone(),
            device,
            model,
            labels,
            acceleration,
        })
    }
}

impl<B: Backend, M> BaseHandler<B, M> {
    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == HandlerState::Initialized
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.loaded.as_ref().map(|loaded| &loaded.manifest)
    }

    /// The target the model was placed on. Differs from the resolved
    /// accelerator when the device mapper could not place it there.
    pub fn device(&self) -> Option<&ComputeDevice> {
        self.loaded.as_ref().map(|loaded| &loaded.device)
    }

    pub fn model(&self) -> Option<&ModelHandle<B, M>> {
        self.loaded.as_ref().map(|loaded| &loaded.model)
    }

    pub fn labels(&self) -> Option<&LabelMapping> {
        self.loaded.as_ref().and_then(|loaded| loaded.labels.as_ref())
    }

    /// Acceleration settings for the runtime to apply, when the accelerated
    /// CPU path was taken.
    pub fn acceleration(&self) -> Option<&AccelerationConfig> {
        self.loaded
            .as_ref()
            .and_then(|loaded| loaded.acceleration.as_ref())
    }

    pub(crate) fn ready(&self) -> Result<&Loaded<B, M>, HandlerError> {
        self.state.ensure_ready()?;
        self.loaded.as_ref().ok_or(HandlerError::Uninitialized)
    }
}
