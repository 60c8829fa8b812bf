use crate::params::Params;
use ndarray::{ArrayD, IxDyn};
use std::path::Path;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Executes a loaded detection network on a preprocessed NCHW tensor.
pub trait InferenceBackend {
    fn load_model(path: &Path, params: &Params) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on a `[1, 3, h, w]` input.
    fn infer(&mut self, images: &ArrayD<f32>) -> anyhow::Result<InferenceOutput>;
}

/// Raw network outputs, ordered as the configured
/// [`OutputLayout`](crate::params::OutputLayout) expects them:
/// `[predictions]` for YOLO, `[dets, labels]` for DETR.
#[derive(Debug, Clone, Default)]
pub struct InferenceOutput {
    pub tensors: Vec<ArrayD<f32>>,
}

impl InferenceOutput {
    pub fn new(tensors: Vec<ArrayD<f32>>) -> Self {
        Self { tensors }
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn shapes(&self) -> Vec<IxDyn> {
        self.tensors.iter().map(|t| t.raw_dim()).collect()
    }
}
