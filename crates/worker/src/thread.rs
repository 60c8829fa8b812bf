use crate::metrics::WorkerMetrics;
use common::{Level, Logger};
use model::{BBox, Detections, Detector, InferenceBackend, OrtBackend, Params};
use opentelemetry::KeyValue;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(0);

/// Runs detection for one caller at a time and keeps the latest results.
///
/// The logger, params and detector are shared handles; the result buffers
/// belong to this worker alone. Workers created through [`create_worker`]
/// each load their own detector. To share one loaded model, build workers
/// with [`Worker::from_parts`] around the same detector handle; their calls
/// are then serialized on its mutex.
pub struct Worker<B: InferenceBackend = OrtBackend> {
    id: u64,
    logger: Arc<Logger>,
    params: Arc<Params>,
    detector: Arc<Mutex<Detector<B>>>,
    detections: Detections,
    metrics: WorkerMetrics,
}

/// Build a worker with its own ONNX Runtime detector for the model at
/// `onnx_path`.
pub fn create_worker(
    onnx_path: impl AsRef<Path>,
    level: Level,
    params: impl Into<Arc<Params>>,
) -> anyhow::Result<Worker> {
    Worker::new(onnx_path, level, params)
}

impl Worker {
    pub fn new(
        onnx_path: impl AsRef<Path>,
        level: Level,
        params: impl Into<Arc<Params>>,
    ) -> anyhow::Result<Self> {
        Self::load(onnx_path, level, params)
    }
}

impl<B: InferenceBackend> Worker<B> {
    /// Like [`Worker::new`] for any backend.
    pub fn load(
        onnx_path: impl AsRef<Path>,
        level: Level,
        params: impl Into<Arc<Params>>,
    ) -> anyhow::Result<Self> {
        let logger = Arc::new(Logger::new(level));
        let params = params.into();
        let onnx_path = onnx_path.as_ref();

        let detector = Detector::new(onnx_path, &params)?;

        let worker = Self::from_parts(logger, params, Arc::new(Mutex::new(detector)));
        if worker.logger.enabled(Level::Info) {
            tracing::info!(
                worker_id = worker.id,
                model = %onnx_path.display(),
                layout = %worker.params.layout,
                "Worker created"
            );
        }
        Ok(worker)
    }

    pub fn from_parts(
        logger: Arc<Logger>,
        params: Arc<Params>,
        detector: Arc<Mutex<Detector<B>>>,
    ) -> Self {
        Self {
            id: NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed),
            logger,
            params,
            detector,
            detections: Detections::default(),
            metrics: WorkerMetrics::new(),
        }
    }

    /// Detect objects in the image at `image_path`.
    ///
    /// The results replace this worker's buffers and are returned by
    /// reference; they stay readable through [`Worker::scores`] and
    /// [`Worker::boxes`] until the next call. On error the buffers are empty.
    pub fn inference(&mut self, image_path: impl AsRef<Path>) -> anyhow::Result<&Detections> {
        let image_path = image_path.as_ref();
        let _s = tracing::info_span!(
            "worker_inference",
            worker_id = self.id,
            image = %image_path.display()
        )
        .entered();

        self.detections.clear();
        let attributes = [KeyValue::new("worker.id", self.id as i64)];
        let start = Instant::now();

        let result = self
            .detector
            .lock()
            .map_err(|_| anyhow::anyhow!("Detector lock poisoned by a panicked worker"))
            .and_then(|mut detector| detector.detect_path(image_path));

        match result {
            Ok(detections) => {
                let elapsed = start.elapsed();
                self.metrics
                    .record_success(elapsed, detections.len(), &attributes);
                self.detections = detections;

                if self.logger.enabled(Level::Debug) {
                    tracing::debug!(
                        detections = self.detections.len(),
                        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                        "Inference complete"
                    );
                }
                Ok(&self.detections)
            }
            Err(e) => {
                self.metrics.record_failure(&attributes);

                if self.logger.enabled(Level::Warn) {
                    tracing::warn!(error = %e, "Inference failed");
                }
                Err(e.context(format!("Inference failed for {}", image_path.display())))
            }
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn params(&self) -> &Arc<Params> {
        &self.params
    }

    pub fn detector(&self) -> &Arc<Mutex<Detector<B>>> {
        &self.detector
    }

    pub fn detections(&self) -> &Detections {
        &self.detections
    }

    pub fn scores(&self) -> &[f32] {
        self.detections.scores()
    }

    pub fn boxes(&self) -> &[BBox] {
        self.detections.boxes()
    }
}
