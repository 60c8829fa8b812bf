use common::TelemetryGuard;
use std::path::PathBuf;
use worker::{WorkerConfig, create_worker, inputs::collect_images};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env()?;

    let _telemetry = config
        .otel_endpoint
        .as_ref()
        .map(|endpoint| {
            TelemetryGuard::init("worker", endpoint, config.log_level, config.environment)
        })
        .transpose()?;

    let args: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if args.is_empty() {
        anyhow::bail!("Usage: worker <IMAGE_OR_DIR>...");
    }

    let mut worker = create_worker(&config.model_path, config.log_level, config.params.clone())?;

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    let images = collect_images(&args)?;
    tracing::info!(images = images.len(), "Starting inference");

    let mut failures = 0usize;
    for path in &images {
        match worker.inference(path) {
            Ok(detections) => {
                tracing::info!(
                    image = %path.display(),
                    detections = detections.len(),
                    "Processed image"
                );
                for (score, bbox) in detections.iter() {
                    tracing::info!(
                        image = %path.display(),
                        class_id = bbox.class_id,
                        score,
                        x1 = bbox.x1,
                        y1 = bbox.y1,
                        x2 = bbox.x2,
                        y2 = bbox.y2,
                        "Detection"
                    );
                }
            }
            Err(e) => {
                failures += 1;
                tracing::error!(error = ?e, "Skipping image");
            }
        }
    }

    tracing::info!(
        processed = images.len() - failures,
        failures,
        "Inference finished"
    );

    Ok(())
}
