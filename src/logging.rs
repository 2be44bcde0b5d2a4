//! Diagnostic logging for the pkgtidy CLI.
//!
//! User-facing progress goes through [`LogSink`](crate::sink::LogSink) and is
//! printed by the output module. This subscriber carries the `tracing`
//! diagnostics emitted inside the operations, plus an optional log file.

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::path::Path;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system
///
/// # Arguments
/// * `verbose` - Enable debug level logging
/// * `log_file` - Optional path to append debug logs to
///
/// `RUST_LOG` overrides the terminal filter.
///
/// # Examples
/// ```ignore
/// // Info level
/// init(false, None)?;
///
/// // Debug output plus a log file
/// init(true, Some(Path::new("pkgtidy.log")))?;
/// ```
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pkgtidy={}", level)));

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_names(verbose)
        .with_file(false)
        .with_line_number(false)
        .without_time()
        .compact()
        .with_ansi(true)
        .with_filter(env_filter);

    match log_file {
        Some(log_path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .map_err(|source| Error::LogFile {
                    path: log_path.to_path_buf(),
                    source,
                })?;

            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(EnvFilter::new("pkgtidy=debug"));

            tracing_subscriber::registry()
                .with(stdout_layer)
                .with(file_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry().with(stdout_layer).init();
        }
    }

    Ok(())
}
