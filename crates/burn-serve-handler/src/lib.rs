//! Model handler lifecycle for serving [Burn](https://burn.dev) models.
//!
//! A serving runtime creates one handler per worker, calls
//! [`ServingHandler::initialize`] with the worker's [`DeploymentContext`] and then
//! pushes request batches through the `preprocess`, `inference` and `postprocess`
//! stages of a user-provided [`Handler`].
//!
//! ```ignore
//! let factory = ModelFactory::new()
//!     .register_init::<ResNetConfig>("resnet")
//!     .compiled_init();
//! let mut handler = ServingHandler::<NdArray, _>::new(ImageClassifier, factory);
//! handler.initialize(&DeploymentContext::from_model_dir("/models/resnet", None)?)?;
//! let labels = handler.handle(images)?;
//! ```
//!
//! Models are built through a [`ModelFactory`]: either from a definition file
//! naming exactly one registered constructor plus a saved parameter record, or
//! from a self-contained [`CompiledArtifact`].

pub mod acceleration;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod context;
pub mod device;
mod error;
pub mod factory;
pub mod handler;
mod inspect;
pub mod labels;
mod model;
pub mod package;
pub mod probe;
mod state;

pub use acceleration::AccelerationConfig;
pub use config::{AccelerationSettings, HandlerConfig};
pub use context::{DeploymentContext, Manifest};
pub use device::{ComputeDevice, DefaultDeviceMapper, DeviceMapper};
pub use error::HandlerError;
pub use factory::{CompiledArtifact, Init, ModelFactory};
pub use handler::{BaseHandler, Handler, ServingHandler, Stage};
pub use inspect::{PackageReport, inspect};
pub use labels::LabelMapping;
pub use model::ModelHandle;
pub use package::{ModelDefinition, ModelFormat};
pub use probe::{AcceleratorProfile, HostProbe, SystemProbe};
pub use state::HandlerState;
