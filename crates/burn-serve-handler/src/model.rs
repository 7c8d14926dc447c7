use std::fmt::{Debug, Formatter};

use burn::module::Module;
use burn::prelude::Backend;

/// A loaded model resident on its device, ready for evaluation.
///
/// Only the handler owns a `ModelHandle`; pipeline stages receive `&ModelHandle`
/// and cannot modify the model's parameters.
pub struct ModelHandle<B: Backend, M> {
    model: M,
    device: B::Device,
}

impl<B: Backend, M: Module<B>> ModelHandle<B, M> {
    /// Moves `model` to `device` and disables gradient tracking.
    pub fn new(model: M, device: B::Device) -> Self {
        let model = model.to_device(&device).no_grad();
        Self { model, device }
    }

    /// Runs `f` against the model.
    pub fn with<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(&self.model)
    }

    /// Number of parameters in the loaded model.
    pub fn num_params(&self) -> usize {
        self.model.num_params()
    }
}

impl<B: Backend, M> ModelHandle<B, M> {
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Whether forward passes run without training-time behaviour.
    ///
    /// Burn modules only enable dropout and gradient tracking on autodiff
    /// backends, so this holds for every backend a handler accepts.
    pub fn is_evaluation(&self) -> bool {
        !B::ad_enabled()
    }

    pub fn model_type(&self) -> String {
        tynm::type_name::<M>()
    }
}

impl<B: Backend, M> std::ops::Deref for ModelHandle<B, M> {
    type Target = M;

    fn deref(&self) -> &Self::Target {
        &self.model
    }
}

impl<B: Backend, M> Debug for ModelHandle<B, M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model", &self.model_type())
            .field("device", &self.device)
            .finish()
    }
}
