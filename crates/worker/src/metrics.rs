use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::time::Duration;

const METER_NAME: &str = "worker";

/// Per-image instruments. Without a meter provider (see
/// [`common::TelemetryGuard`]) these are no-ops.
#[derive(Clone)]
pub struct WorkerMetrics {
    duration_histogram: Histogram<f64>,
    images_counter: Counter<u64>,
    failures_counter: Counter<u64>,
    detections_counter: Counter<u64>,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        let meter = global::meter(METER_NAME);
        let latency_buckets = [
            0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];
        Self {
            duration_histogram: meter
                .f64_histogram("worker_inference_duration_seconds")
                .with_description("Time to process one image (decode + detect)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            images_counter: meter
                .u64_counter("worker_images_total")
                .with_description("Total images submitted to inference")
                .build(),
            failures_counter: meter
                .u64_counter("worker_inference_failures_total")
                .with_description("Total images that failed to decode or detect")
                .build(),
            detections_counter: meter
                .u64_counter("worker_detections_total")
                .with_description("Total detections produced")
                .build(),
        }
    }

    pub fn record_success(&self, elapsed: Duration, detections: usize, attributes: &[KeyValue]) {
        self.images_counter.add(1, attributes);
        self.duration_histogram
            .record(elapsed.as_secs_f64(), attributes);
        self.detections_counter.add(detections as u64, attributes);
    }

    pub fn record_failure(&self, attributes: &[KeyValue]) {
        self.images_counter.add(1, attributes);
        self.failures_counter.add(1, attributes);
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
