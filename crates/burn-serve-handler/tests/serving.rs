use std::path::Path;

use burn::backend::NdArray;
use burn::config::Config;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::{Backend, Module};
use burn::tensor::{Tensor, TensorData};
use burn_serve_handler::probe::ProbeError;
use burn_serve_handler::{
    AcceleratorProfile, CompiledArtifact, ComputeDevice, DeploymentContext, Handler,
    HandlerConfig, HandlerError, HandlerState, HostProbe, Init, LabelMapping, ModelFactory,
    ModelHandle, ServingHandler,
};

type TestBackend = NdArray;
type Device = <TestBackend as Backend>::Device;

#[derive(Config, Debug)]
struct RegressorConfig {
    features: usize,
}

#[derive(Module, Debug)]
struct Regressor<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> Init<B, CompiledArtifact> for Regressor<B> {
    type Error = HandlerError;
    fn init(artifact: &CompiledArtifact, device: &B::Device) -> Result<Self, Self::Error> {
        let config: RegressorConfig = artifact.config()?;
        let linear = LinearConfig::new(config.features, 1).init(device);
        artifact.load_into(Regressor { linear }, device)
    }
}

struct Scores;

impl<B: Backend> Handler<B> for Scores {
    type Model = Regressor<B>;
    type Batch = Vec<f32>;
    type Prepared = Tensor<B, 2>;
    type Output = Vec<f32>;
    type Response = String;

    fn preprocess(&self, batch: Vec<f32>, device: &B::Device) -> anyhow::Result<Tensor<B, 2>> {
        let len = batch.len();
        Ok(Tensor::from_data(TensorData::new(batch, [1, len]), device))
    }

    fn inference(
        &self,
        model: &ModelHandle<B, Regressor<B>>,
        input: Tensor<B, 2>,
    ) -> anyhow::Result<Vec<f32>> {
        let output = model.linear.forward(input);
        Ok(output.into_data().iter::<f32>().collect())
    }

    fn postprocess(
        &self,
        output: Vec<f32>,
        _labels: Option<&LabelMapping>,
    ) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&output)?)
    }
}

/// A host with no accelerator and no acceleration library.
struct PlainHost;

impl HostProbe for PlainHost {
    fn accelerator_count(&self) -> usize {
        0
    }

    fn acceleration_library(&self, _library: &str) -> Option<AcceleratorProfile> {
        None
    }

    fn cpu_topology(&self) -> Result<String, ProbeError> {
        Err(ProbeError::Topology("not probed".to_string()))
    }
}

fn package(dir: &Path, features: usize) {
    let config = RegressorConfig::new(features);
    let linear = LinearConfig::new(features, 1).init::<TestBackend>(&Device::default());
    CompiledArtifact::from_module::<TestBackend, _, _>("regressor", &config, Regressor { linear })
        .unwrap()
        .write(&dir.join("model.pt"))
        .unwrap();

    std::fs::create_dir_all(dir.join("MAR-INF")).unwrap();
    std::fs::write(
        dir.join("MAR-INF/MANIFEST.json"),
        r#"{
            "createdOn": "19/10/2026 10:00:00",
            "runtime": "rust",
            "model": {
                "modelName": "regressor",
                "serializedFile": "model.pt",
                "handler": "scores",
                "modelVersion": "1.0"
            }
        }"#,
    )
    .unwrap();
}

fn handler() -> ServingHandler<TestBackend, Scores> {
    let factory = ModelFactory::new().compiled_init();
    ServingHandler::new(Scores, factory)
        .with_config(HandlerConfig::default())
        .with_probe(PlainHost)
}

#[test]
fn packaged_model_directory_serves_requests() {
    let dir = tempfile::tempdir().unwrap();
    package(dir.path(), 3);

    let ctx = DeploymentContext::from_model_dir(dir.path(), None).unwrap();
    let mut handler = handler();
    handler.initialize(&ctx).unwrap();

    let base = handler.base();
    assert_eq!(base.state(), HandlerState::Initialized);
    assert_eq!(base.device(), Some(&ComputeDevice::Cpu));
    assert_eq!(
        base.manifest().unwrap().model.model_name.as_deref(),
        Some("regressor")
    );
    assert_eq!(base.model().unwrap().num_params(), 4);

    let response = handler.handle(vec![1.0, 2.0, 3.0]).unwrap();
    let scores: Vec<f32> = serde_json::from_str(&response).unwrap();
    assert_eq!(scores.len(), 1);
}

#[test]
fn device_mapper_receives_resolved_device() {
    let dir = tempfile::tempdir().unwrap();
    package(dir.path(), 2);

    let ctx = DeploymentContext::from_model_dir(dir.path(), Some(5)).unwrap();
    let mut handler = handler().with_device_mapper(|device: &ComputeDevice| {
        assert_eq!(device, &ComputeDevice::Cpu);
        Some(Device::default())
    });
    handler.initialize(&ctx).unwrap();
    assert!(handler.base().is_initialized());
}

#[test]
fn corrupt_artifact_fails_initialization() {
    let dir = tempfile::tempdir().unwrap();
    package(dir.path(), 2);
    std::fs::write(dir.path().join("model.pt"), b"truncated").unwrap();

    let ctx = DeploymentContext::from_model_dir(dir.path(), None).unwrap();
    let mut handler = handler();
    let err = handler.initialize(&ctx).unwrap_err();

    assert!(matches!(err, HandlerError::ArtifactLoad(_)));
    assert_eq!(handler.base().state(), HandlerState::Failed);
    assert!(matches!(
        handler.handle(vec![1.0, 2.0]),
        Err(HandlerError::Failed)
    ));
}
