pub mod backend;
pub mod detector;
pub mod error;
pub mod params;
pub mod processing;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
#[cfg(feature = "ort-backend")]
pub use backend::ort::OrtBackend;
pub use detector::{BBox, Detections, Detector};
pub use error::DetectorError;
pub use params::{ExecutionProvider, OutputLayout, Params};
