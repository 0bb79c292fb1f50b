//! Structured logging for the network digital twin
//!
//! Thin setup layer over `tracing-subscriber` and `tracing-appender`:
//!
//! - **Console**: pretty human-readable lines or JSONL, on stderr
//! - **File**: JSONL with daily/hourly rotation via tracing-appender
//! - **Filtering**: `RUST_LOG` when set, otherwise the configured level
//!
//! # Quick Start
//!
//! ```ignore
//! use twin_logging::{LogConfig, TwinSubscriberBuilder};
//!
//! // Development mode with pretty human-readable output
//! let _guard = TwinSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! The returned guard flushes file output when dropped; keep it alive for
//! the lifetime of the program.

pub mod config;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use tracing_appender::non_blocking::WorkerGuard;

use thiserror::Error;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Log file setup failed: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Subscriber already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Builder for configuring and initializing the logging subscriber
///
/// By default, console output uses JSONL format. Use
/// [`LogConfig::development()`] for pretty output.
#[derive(Debug, Clone, Default)]
pub struct TwinSubscriberBuilder {
    config: LogConfig,
}

impl TwinSubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Add a filter directive such as `twin_simulation=trace`
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.config.directives.push(directive.into());
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// Returns the file writer's guard when file output is configured.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.filter_directives())?,
        };

        let mut outputs: Vec<layers::BoxedLayer<Registry>> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            outputs.push(layers::console_layer(&self.config.console, &self.config.jsonl));
        }

        if let Some(file) = &self.config.file {
            let (writer, file_guard) = layers::file_writer(file)?;
            outputs.push(layers::jsonl_layer(writer, &self.config.jsonl));
            guard = Some(file_guard);
        }

        Registry::default().with(outputs).with(filter).try_init()?;
        Ok(guard)
    }
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Result<Option<WorkerGuard>, LoggingError> {
    TwinSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for tests; repeated calls are harmless
pub fn init_testing() {
    let _ = TwinSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
