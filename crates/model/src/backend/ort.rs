use super::{InferenceBackend, InferenceOutput};
use crate::params::{ExecutionProvider, OutputLayout, Params};
use ndarray::ArrayD;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::path::Path;

const DETR_OUTPUTS: [&str; 2] = ["dets", "labels"];

pub struct OrtBackend {
    session: Session,
    layout: OutputLayout,
}

impl OrtBackend {
    fn build_session(path: &Path, params: &Params) -> anyhow::Result<Session> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(params.intra_threads)?;

        match params.provider {
            ExecutionProvider::Cuda { device_id } => {
                tracing::info!(
                    device_id,
                    "Initializing ONNX Runtime with CUDA execution provider"
                );
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(device_id)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        Ok(builder.commit_from_file(path)?)
    }
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &Path, params: &Params) -> anyhow::Result<Self> {
        let session = Self::build_session(path, params)?;

        tracing::info!(
            model = %path.display(),
            layout = %params.layout,
            intra_threads = params.intra_threads,
            "Model loaded"
        );
        Ok(Self {
            session,
            layout: params.layout,
        })
    }

    fn infer(&mut self, images: &ArrayD<f32>) -> anyhow::Result<InferenceOutput> {
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(images.view())?])?;

        let tensors = match self.layout {
            OutputLayout::Yolo => vec![outputs[0].try_extract_array::<f32>()?.into_owned()],
            OutputLayout::Detr => DETR_OUTPUTS
                .iter()
                .map(|name| {
                    Ok(outputs[*name].try_extract_array::<f32>()?.into_owned())
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
        };

        Ok(InferenceOutput::new(tensors))
    }
}
