//! Tracing setup.
//!
//! Stdout carries the MCP protocol, so human-readable logs go to stderr,
//! filtered by `RUST_LOG` (default `info`). When a log directory is given,
//! two daily-rolling JSON files are added: `system.log` with every event
//! and `errors.log` with errors only.

use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Install the global subscriber. Keep the returned guards alive until exit
/// so buffered file output is flushed.
pub fn init(log_dir: Option<&Path>) -> std::io::Result<Vec<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let (files, guards) = match log_dir {
        Some(dir) => {
            let (layers, guards) = file_layers(dir)?;
            (Some(layers), guards)
        }
        None => (None, Vec::new()),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(files)
        .init();

    Ok(guards)
}

/// Daily-rolling `system.log` and `errors.log` under `dir`.
pub fn file_layers<S>(dir: &Path) -> std::io::Result<(impl Layer<S>, Vec<WorkerGuard>)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(dir)?;

    let (system, system_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "system.log"));
    let (errors, errors_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "errors.log"));

    Ok((json_layers(system, errors), vec![system_guard, errors_guard]))
}

/// JSON layers routing every event to `system` and errors to `errors`.
pub fn json_layers<S, W1, W2>(system: W1, errors: W2) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W1: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    W2: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let system_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(system)
        .with_filter(LevelFilter::TRACE);
    let errors_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(errors)
        .with_filter(LevelFilter::ERROR);
    system_layer.and_then(errors_layer)
}
