//! Tracing setup for the `cleanup` binary.

use std::env;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the stderr filter directives.
pub const LOG_ENV: &str = "CLEANUP_LOG";

/// Installs the global subscriber.
///
/// Terminal output goes to stderr, filtered by `CLEANUP_LOG` (default
/// `warn`, or `error` when `silent`). When `log_file` is given, every
/// event at `info` and above is also appended to it without ANSI codes.
///
/// The returned guard flushes the file writer on drop and must be held
/// until the program exits.
pub fn init(log_file: Option<&Path>, silent: bool) -> Option<WorkerGuard> {
    let default_filter = if silent { "error" } else { "warn" };
    let filter = env::var(LOG_ENV).unwrap_or_else(|_| default_filter.to_string());
    let stderr_filter =
        EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_filter(stderr_filter);

    let (file_layer, guard) = match log_file.map(file_appender) {
        Some(Ok(appender)) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(EnvFilter::new("info"));
            (Some(layer), Some(guard))
        }
        Some(Err(e)) => {
            eprintln!("Warning: could not open log file: {}", e);
            (None, None)
        }
        None => (None, None),
    };

    if tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        // A subscriber is already installed; keep it.
        return guard;
    }

    info!("Cleanup session started");
    if let Some(path) = log_file {
        info!(log_file = %path.display(), "Logging to file");
    }
    guard
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cleanup.log".to_string());

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
}
