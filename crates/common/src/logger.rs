use crate::config::Environment;
use opentelemetry::global::BoxedTracer;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Logging verbosity, ordered from quietest to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid log level: {0}")]
pub struct ParseLevelError(pub String);

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        }
    }

    pub fn as_filter(self) -> LevelFilter {
        LevelFilter::from_level(self.into())
    }
}

impl From<Level> for tracing::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => tracing::Level::ERROR,
            Level::Warn => tracing::Level::WARN,
            Level::Info => tracing::Level::INFO,
            Level::Debug => tracing::Level::DEBUG,
            Level::Trace => tracing::Level::TRACE,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" | "verbose" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Initialize the global tracing subscriber with pretty formatting for
/// development and JSON formatting for production.
///
/// `RUST_LOG` takes precedence over `level` when it is set. Only the first
/// call installs a subscriber, later calls keep the existing one. Span export
/// is wired by [`crate::TelemetryGuard`] instead.
pub fn setup_logging(level: Level, environment: Environment) {
    if install_subscriber(level, environment, None).is_err() {
        tracing::debug!(
            requested = %level,
            "Global subscriber already installed, keeping it"
        );
    }
}

/// Build the filter and formatter for `level`/`environment`, bridge spans to
/// `tracer` when one is given, and install the result globally.
pub(crate) fn install_subscriber(
    level: Level,
    environment: Environment,
    tracer: Option<BoxedTracer>,
) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)));

    match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init(),
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .try_init(),
    }
}

/// Handle to the process logging setup, carrying the verbosity its owner
/// asked for.
#[derive(Debug)]
pub struct Logger {
    level: Level,
}

impl Logger {
    pub fn new(level: Level) -> Self {
        Self::with_environment(level, Environment::from_env())
    }

    pub fn with_environment(level: Level, environment: Environment) -> Self {
        setup_logging(level, environment);
        tracing::debug!(level = %level, environment = environment.as_str(), "Logger ready");
        Self { level }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Whether messages at `level` pass this logger's verbosity.
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }
}
