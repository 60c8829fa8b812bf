pub mod config;
pub mod inputs;
pub mod metrics;
pub mod thread;

pub use config::WorkerConfig;
pub use thread::{Worker, create_worker};
