use std::collections::BTreeMap;
use std::path::Path;

use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Record, Recorder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::package::ModelDefinition;

/// Trait for models that can be initialized from user-defined arguments.
pub trait Init<B, InitArgs = ()>: Sized
where
    B: Backend,
{
    type Error: Into<anyhow::Error>;
    /// Initialize the model from the given arguments and device.
    fn init(args: &InitArgs, device: &B::Device) -> Result<Self, Self::Error>;
}

/// Self-contained model artifact: configuration and weights in one file.
///
/// Stored as named MessagePack. The weights are a burn record encoded with
/// [`NamedMpkBytesRecorder`] at full precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub model: String,
    /// JSON-encoded model configuration.
    config: String,
    weights: Vec<u8>,
}

impl CompiledArtifact {
    pub fn new(
        model: impl Into<String>,
        config: &impl Serialize,
        weights: Vec<u8>,
    ) -> Result<Self, HandlerError> {
        let config = serde_json::to_string(config)
            .map_err(|e| HandlerError::ArtifactLoad(format!("Failed to encode config: {e}")))?;
        Ok(Self {
            model: model.into(),
            config,
            weights,
        })
    }

    /// Packs `module` together with the configuration it was built from.
    pub fn from_module<B: Backend, M: Module<B>, C: Serialize>(
        model: &str,
        config: &C,
        module: M,
    ) -> Result<Self, HandlerError> {
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
        let weights = Recorder::<B>::record(&recorder, module.into_record(), ())?;
        Self::new(model, config, weights)
    }

    pub fn config<C: DeserializeOwned>(&self) -> Result<C, HandlerError> {
        serde_json::from_str(&self.config)
            .map_err(|e| HandlerError::ArtifactLoad(format!("Invalid model config: {e}")))
    }

    pub fn record<B: Backend, R: Record<B>>(&self, device: &B::Device) -> Result<R, HandlerError> {
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
        Ok(Recorder::<B>::load(&recorder, self.weights.clone(), device)?)
    }

    /// Loads the stored weights onto an already constructed module.
    pub fn load_into<B: Backend, M: Module<B>>(
        &self,
        module: M,
        device: &B::Device,
    ) -> Result<M, HandlerError> {
        let record = self.record::<B, M::Record>(device)?;
        Ok(module.load_record(record))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, HandlerError> {
        rmp_serde::to_vec_named(self).map_err(|e| HandlerError::ArtifactLoad(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HandlerError> {
        rmp_serde::from_slice(bytes).map_err(|e| {
            HandlerError::ArtifactLoad(format!("Not a compiled model artifact: {e}"))
        })
    }

    pub fn read(path: &Path) -> Result<Self, HandlerError> {
        let bytes = std::fs::read(path).map_err(|e| HandlerError::io(path, e))?;
        Self::from_bytes(&bytes)
    }

    pub fn write(&self, path: &Path) -> Result<(), HandlerError> {
        std::fs::write(path, self.to_bytes()?).map_err(|e| HandlerError::io(path, e))
    }
}

type Constructor<B, M> =
    Box<dyn Fn(&ModelDefinition, &<B as Backend>::Device) -> anyhow::Result<M> + Send + Sync>;
type CompiledLoader<B, M> =
    Box<dyn Fn(&CompiledArtifact, &<B as Backend>::Device) -> anyhow::Result<M> + Send + Sync>;

/// Registry of the ways a model of type `M` can be built.
///
/// Definition-based artifacts are matched by `name@version`, then by `name`.
/// Compiled artifacts use the single compiled loader.
pub struct ModelFactory<B: Backend, M> {
    constructors: BTreeMap<String, Constructor<B, M>>,
    compiled: Option<CompiledLoader<B, M>>,
}

impl<B: Backend, M> Default for ModelFactory<B, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, M> ModelFactory<B, M> {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
            compiled: None,
        }
    }

    /// Registers a constructor under `key` (`name` or `name@version`).
    pub fn register<F>(mut self, key: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&ModelDefinition, &B::Device) -> anyhow::Result<M> + Send + Sync + 'static,
    {
        let key = key.into();
        log::debug!("Registering model constructor '{key}'");
        self.constructors.insert(key, Box::new(constructor));
        self
    }

    /// Registers a constructor that deserializes the definition's config and
    /// hands it to [`Init`].
    pub fn register_init<C>(self, key: impl Into<String>) -> Self
    where
        C: DeserializeOwned + 'static,
        M: Init<B, C> + 'static,
    {
        self.register(key, |definition, device| {
            let config: C = serde_json::from_value(definition.config.clone())?;
            <M as Init<B, C>>::init(&config, device).map_err(Into::into)
        })
    }

    pub fn compiled<F>(mut self, loader: F) -> Self
    where
        F: Fn(&CompiledArtifact, &B::Device) -> anyhow::Result<M> + Send + Sync + 'static,
    {
        self.compiled = Some(Box::new(loader));
        self
    }

    /// Uses [`Init`] over [`CompiledArtifact`] as the compiled loader.
    pub fn compiled_init(self) -> Self
    where
        M: Init<B, CompiledArtifact> + 'static,
    {
        self.compiled(|artifact, device| {
            <M as Init<B, CompiledArtifact>>::init(artifact, device).map_err(Into::into)
        })
    }

    pub fn registered(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    pub fn supports_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn construct(
        &self,
        definition: &ModelDefinition,
        device: &B::Device,
    ) -> Result<M, HandlerError> {
        let constructor = self
            .constructors
            .get(&definition.id())
            .or_else(|| self.constructors.get(&definition.name))
            .ok_or_else(|| HandlerError::UnknownModel {
                name: definition.id(),
                registered: self.registered(),
            })?;
        constructor(definition, device).map_err(HandlerError::ModelConstruction)
    }

    pub fn load_compiled(
        &self,
        artifact: &CompiledArtifact,
        device: &B::Device,
    ) -> Result<M, HandlerError> {
        let loader = self.compiled.as_ref().ok_or_else(|| {
            HandlerError::UnsupportedFormat(format!(
                "artifact for '{}' is compiled but no compiled loader is registered",
                artifact.model
            ))
        })?;
        loader(artifact, device).map_err(HandlerError::ModelConstruction)
    }
}

impl<B: Backend, M: Module<B>> ModelFactory<B, M> {
    /// Builds the model named by `definition` and loads the parameter record
    /// stored at `artifact_path` onto it.
    pub fn load_eager(
        &self,
        definition: &ModelDefinition,
        artifact_path: &Path,
        device: &B::Device,
    ) -> Result<M, HandlerError> {
        let model = self.construct(definition, device)?;
        let bytes = std::fs::read(artifact_path).map_err(|e| HandlerError::io(artifact_path, e))?;
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
        let record: M::Record = Recorder::<B>::load(&recorder, bytes, device)?;
        Ok(model.load_record(record))
    }

    pub fn load_compiled_path(
        &self,
        artifact_path: &Path,
        device: &B::Device,
    ) -> Result<M, HandlerError> {
        let artifact = CompiledArtifact::read(artifact_path)?;
        self.load_compiled(&artifact, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::{TestBackend, TestModel, TestModelConfig};

    type Device = <TestBackend as Backend>::Device;

    fn factory() -> ModelFactory<TestBackend, TestModel<TestBackend>> {
        ModelFactory::new()
            .register_init::<TestModelConfig>("linear")
            .compiled_init()
    }

    #[test]
    fn constructs_by_versioned_then_plain_name() {
        let factory = factory().register("linear@2", |_, device| {
            Ok(TestModelConfig::new(2, 2).init(device))
        });
        let device = Device::default();

        let v2 = ModelDefinition::new("linear").with_version("2");
        let model = factory.construct(&v2, &device).unwrap();
        assert_eq!(model.input_size(), 2);

        let v1 = ModelDefinition::new("linear")
            .with_version("1")
            .with_config(serde_json::json!({"input_size": 4, "output_size": 3}));
        let model = factory.construct(&v1, &device).unwrap();
        assert_eq!(model.input_size(), 4);
    }

    #[test]
    fn unknown_model_lists_registered_names() {
        let err = factory()
            .construct(&ModelDefinition::new("conv"), &Device::default())
            .unwrap_err();
        match err {
            HandlerError::UnknownModel { name, registered } => {
                assert_eq!(name, "conv");
                assert_eq!(registered, vec!["linear".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_config_fails_construction() {
        let definition =
            ModelDefinition::new("linear").with_config(serde_json::json!({"input_size": "x"}));
        let err = factory()
            .construct(&definition, &Device::default())
            .unwrap_err();
        assert!(matches!(err, HandlerError::ModelConstruction(_)));
    }

    #[test]
    fn compiled_artifact_survives_a_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pt");
        let device = Device::default();
        let config = TestModelConfig::new(3, 2);
        let module = config.init::<TestBackend>(&device);
        let artifact =
            CompiledArtifact::from_module::<TestBackend, _, _>("linear", &config, module).unwrap();
        artifact.write(&path).unwrap();

        let model = factory().load_compiled_path(&path, &device).unwrap();
        assert_eq!(model.input_size(), 3);
    }

    #[test]
    fn compiled_loader_is_required_for_compiled_artifacts() {
        let device = Device::default();
        let config = TestModelConfig::new(3, 2);
        let artifact = CompiledArtifact::new("linear", &config, Vec::new()).unwrap();
        let factory = ModelFactory::<TestBackend, TestModel<TestBackend>>::new();
        assert!(!factory.supports_compiled());
        assert!(matches!(
            factory.load_compiled(&artifact, &device),
            Err(HandlerError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn garbage_is_not_a_compiled_artifact() {
        assert!(matches!(
            CompiledArtifact::from_bytes(b"definitely not msgpack"),
            Err(HandlerError::ArtifactLoad(_))
        ));
    }
}
