pub mod config;
pub mod logger;
pub mod telemetry;

pub use config::Environment;
pub use logger::{Level, Logger, ParseLevelError, setup_logging};
pub use telemetry::TelemetryGuard;
