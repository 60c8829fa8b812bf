mod types;

pub use types::{BBox, Detections};

use crate::{
    backend::InferenceBackend,
    error::DetectorError,
    params::{OutputLayout, Params},
    processing::{post::PostProcessor, pre::PreProcessor},
};
use common::span;
use image::RgbImage;
use std::path::Path;

/// Runs one image through letterbox, network and decoding.
///
/// A detector owns mutable scratch buffers and a backend session, so calls
/// through one instance are sequential. Share it behind a mutex if several
/// callers need the same loaded model.
pub struct Detector<B: InferenceBackend> {
    backend: B,
    pre_processor: PreProcessor,
    post_processor: PostProcessor,
    layout: OutputLayout,
}

impl<B: InferenceBackend> Detector<B> {
    /// Validate `params` and load the network at `onnx_path`.
    pub fn new(onnx_path: impl AsRef<Path>, params: &Params) -> anyhow::Result<Self> {
        params.validate()?;

        let path = onnx_path.as_ref();
        if !path.is_file() {
            return Err(DetectorError::ModelNotFound(path.to_path_buf()).into());
        }

        let backend = B::load_model(path, params)?;
        Ok(Self::from_validated(backend, params))
    }

    /// Wrap an already loaded backend.
    pub fn with_backend(backend: B, params: &Params) -> Result<Self, DetectorError> {
        params.validate()?;
        Ok(Self::from_validated(backend, params))
    }

    fn from_validated(backend: B, params: &Params) -> Self {
        Self {
            backend,
            pre_processor: PreProcessor::new(params.input_size, params.layout),
            post_processor: PostProcessor::new(params),
            layout: params.layout,
        }
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    pub fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Detections> {
        let _s = span!("detect");

        let (input, transform) = self.pre_processor.preprocess(image)?;

        let output = {
            let _s = span!("inference");
            self.backend.infer(&input)?
        };

        tracing::trace!(shapes = ?output.shapes(), "Network outputs");

        let detections = {
            let _s = span!("postprocess");
            self.post_processor
                .process(self.layout, &output, &transform)?
        };

        tracing::debug!(
            width = transform.orig_width,
            height = transform.orig_height,
            detections = detections.len(),
            "Image processed"
        );

        Ok(detections)
    }

    /// Decode the image at `path` and run [`Detector::detect`] on it.
    pub fn detect_path(&mut self, path: impl AsRef<Path>) -> anyhow::Result<Detections> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| DetectorError::ImageDecode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();

        self.detect(&image)
    }
}
