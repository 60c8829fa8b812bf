use common::Level;
use model::{ExecutionProvider, OutputLayout, Params};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub environment: Environment,
    pub log_level: Level,
    pub model_path: PathBuf,
    pub params: Params,
    pub otel_endpoint: Option<String>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Unparseable numbers fall back to their default; an unknown log level,
    /// layout or provider is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();
        let defaults = Params::default();

        let log_level = match env::var("LOG_LEVEL") {
            Ok(level) => level.parse()?,
            Err(_) => Level::default(),
        };

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models/model.onnx"));

        let layout = match env::var("MODEL_LAYOUT") {
            Ok(layout) => layout.parse()?,
            Err(_) => OutputLayout::default(),
        };

        let provider = match env::var("EXECUTION_PROVIDER") {
            Ok(name) => ExecutionProvider::parse(&name, env_or("CUDA_DEVICE_ID", 0))?,
            Err(_) => ExecutionProvider::default(),
        };

        let params = Params {
            input_size: (
                env_or("INPUT_WIDTH", defaults.input_size.0),
                env_or("INPUT_HEIGHT", defaults.input_size.1),
            ),
            confidence_threshold: env_or("CONFIDENCE_THRESHOLD", defaults.confidence_threshold),
            nms_threshold: env_or("NMS_THRESHOLD", defaults.nms_threshold),
            max_detections: env_or("MAX_DETECTIONS", defaults.max_detections),
            num_classes: env::var("NUM_CLASSES").ok().and_then(|s| s.parse().ok()),
            layout,
            provider,
            intra_threads: env_or("INTRA_THREADS", defaults.intra_threads),
        };
        params.validate()?;

        let otel_endpoint = env::var("OTEL_ENDPOINT").ok().filter(|s| !s.is_empty());

        Ok(Self {
            environment,
            log_level,
            model_path,
            params,
            otel_endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 15] = [
        "ENVIRONMENT",
        "LOG_LEVEL",
        "MODEL_PATH",
        "MODEL_LAYOUT",
        "INPUT_WIDTH",
        "INPUT_HEIGHT",
        "CONFIDENCE_THRESHOLD",
        "NMS_THRESHOLD",
        "MAX_DETECTIONS",
        "NUM_CLASSES",
        "EXECUTION_PROVIDER",
        "CUDA_DEVICE_ID",
        "INTRA_THREADS",
        "OTEL_ENDPOINT",
        "RUST_LOG",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.log_level, Level::Info);
        assert_eq!(config.model_path, PathBuf::from("models/model.onnx"));
        assert_eq!(config.params, Params::default());
        assert!(config.otel_endpoint.is_none());
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        unsafe {
            env::set_var("LOG_LEVEL", "debug");
            env::set_var("MODEL_PATH", "/models/rfdetr.onnx");
            env::set_var("MODEL_LAYOUT", "detr");
            env::set_var("INPUT_WIDTH", "512");
            env::set_var("INPUT_HEIGHT", "384");
            env::set_var("CONFIDENCE_THRESHOLD", "0.5");
            env::set_var("NUM_CLASSES", "90");
            env::set_var("EXECUTION_PROVIDER", "cuda");
            env::set_var("CUDA_DEVICE_ID", "1");
            env::set_var("OTEL_ENDPOINT", "http://localhost:4317");
        }

        let config = WorkerConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.log_level, Level::Debug);
        assert_eq!(config.model_path, PathBuf::from("/models/rfdetr.onnx"));
        assert_eq!(config.params.layout, OutputLayout::Detr);
        assert_eq!(config.params.input_size, (512, 384));
        assert_eq!(config.params.confidence_threshold, 0.5);
        assert_eq!(config.params.num_classes, Some(90));
        assert_eq!(
            config.params.provider,
            ExecutionProvider::Cuda { device_id: 1 }
        );
        assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));
    }

    #[test]
    #[serial]
    fn test_unparseable_numbers_fall_back_to_defaults() {
        clear_env();
        unsafe { env::set_var("MAX_DETECTIONS", "lots") };

        let config = WorkerConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.params.max_detections, 300);
    }

    #[test]
    #[serial]
    fn test_invalid_values_are_errors() {
        clear_env();
        unsafe { env::set_var("LOG_LEVEL", "loud") };
        let err = WorkerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));

        clear_env();
        unsafe { env::set_var("CONFIDENCE_THRESHOLD", "2.0") };
        assert!(WorkerConfig::from_env().is_err());

        clear_env();
        unsafe { env::set_var("MODEL_LAYOUT", "ssd") };
        assert!(WorkerConfig::from_env().is_err());
        clear_env();
    }
}
