use std::time::Instant;

use burn::module::Module;
use burn::prelude::Backend;

use super::base::BaseHandler;
use crate::config::HandlerConfig;
use crate::context::DeploymentContext;
use crate::device::DeviceMapper;
use crate::error::HandlerError;
use crate::factory::ModelFactory;
use crate::labels::LabelMapping;
use crate::model::ModelHandle;
use crate::probe::HostProbe;

/// Pipeline stage, used to tag stage failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Preprocess,
    Inference,
    Postprocess,
}

/// Per-model request pipeline.
///
/// The output of each stage is the input of the next; the formats are chosen
/// by the implementation.
pub trait Handler<B: Backend> {
    type Model: Module<B>;
    /// Raw request payloads as delivered by the runtime.
    type Batch;
    type Prepared;
    type Output;
    type Response;

    /// Turns raw payloads into model input on `device`.
    fn preprocess(&self, batch: Self::Batch, device: &B::Device)
    -> anyhow::Result<Self::Prepared>;

    /// Runs the model. The handle is borrowed immutably, so the model's
    /// parameters cannot change.
    fn inference(
        &self,
        model: &ModelHandle<B, Self::Model>,
        input: Self::Prepared,
    ) -> anyhow::Result<Self::Output>;

    /// Shapes model output into the runtime's response, attaching labels when
    /// a mapping was packaged.
    fn postprocess(
        &self,
        output: Self::Output,
        labels: Option<&LabelMapping>,
    ) -> anyhow::Result<Self::Response>;
}

/// A [`Handler`] paired with the [`BaseHandler`] that loads its model.
pub struct ServingHandler<B: Backend, H: Handler<B>> {
    base: BaseHandler<B, H::Model>,
    handler: H,
}

impl<B: Backend, H: Handler<B>> ServingHandler<B, H> {
    pub fn new(handler: H, factory: ModelFactory<B, H::Model>) -> Self {
        Self {
            base: BaseHandler::new(factory),
            handler,
        }
    }

    pub fn with_config(mut self, config: HandlerConfig) -> Self {
        self.base = self.base.with_config(config);
        self
    }

    pub fn with_probe(mut self, probe: impl HostProbe + Send + Sync + 'static) -> Self {
        self.base = self.base.with_probe(probe);
        self
    }

    pub fn with_device_mapper(
        mut self,
        devices: impl DeviceMapper<B> + Send + Sync + 'static,
    ) -> Self {
        self.base = self.base.with_device_mapper(devices);
        self
    }

    pub fn base(&self) -> &BaseHandler<B, H::Model> {
        &self.base
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn initialize(&mut self, ctx: &DeploymentContext) -> Result<(), HandlerError> {
        self.base.initialize(ctx)
    }

    pub fn preprocess(&self, batch: H::Batch) -> Result<H::Prepared, HandlerError> {
        let loaded = self.base.ready()?;
        self.handler
            .preprocess(batch, loaded.model.device())
            .map_err(|source| HandlerError::Stage {
                stage: Stage::Preprocess,
                source,
            })
    }

    pub fn inference(&self, input: H::Prepared) -> Result<H::Output, HandlerError> {
        let loaded = self.base.ready()?;
        self.handler
            .inference(&loaded.model, input)
            .map_err(|source| HandlerError::Stage {
                stage: Stage::Inference,
                source,
            })
    }

    pub fn postprocess(&self, output: H::Output) -> Result<H::Response, HandlerError> {
        let loaded = self.base.ready()?;
        self.handler
            .postprocess(output, loaded.labels.as_ref())
            .map_err(|source| HandlerError::Stage {
                stage: Stage::Postprocess,
                source,
            })
    }

    /// Runs the three stages in order on one batch.
    pub fn handle(&self, batch: H::Batch) -> Result<H::Response, HandlerError> {
        let start = Instant::now();
        let prepared = self.preprocess(batch)?;
        let preprocessed = start.elapsed();
        let output = self.inference(prepared)?;
        let inferred = start.elapsed();
        let response = self.postprocess(output)?;
        let total = start.elapsed();

        log::debug!(
            "Handled batch in {total:?} (preprocess {preprocessed:?}, inference {:?}, postprocess {:?})",
            inferred - preprocessed,
            total - inferred
        );
        Ok(response)
    }
}
