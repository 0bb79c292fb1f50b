//! Formatting layers and writers

use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{Layer, fmt::MakeWriter, registry::LookupSpan};

use crate::config::{ConsoleConfig, FileConfig, JsonlConfig, RotationStrategy};

/// Boxed layer, so console and file outputs can be chosen at runtime
pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Create a JSONL formatting layer
pub fn jsonl_layer<S, W>(writer: W, config: &JsonlConfig) -> BoxedLayer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
        .with_writer(writer)
        .boxed()
}

/// Create the console layer: pretty lines or JSONL on stderr
///
/// Stdout is reserved for command output.
pub fn console_layer<S>(console: &ConsoleConfig, jsonl: &JsonlConfig) -> BoxedLayer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    if console.pretty {
        tracing_subscriber::fmt::layer()
            .with_ansi(console.ansi)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        jsonl_layer(std::io::stderr, jsonl)
    }
}

/// Open a non-blocking writer for file output
pub fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let rotation = match config.rotation {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("log");
    if let Some(max) = config.max_files {
        builder = builder.max_log_files(max);
    }

    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}
