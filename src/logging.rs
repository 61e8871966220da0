//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and, unless disabled, to a file as well. When
//! `KBSEARCH_LOG_FILE` is set the file layer appends to that path; otherwise it writes
//! `logs/kbsearch.log`. Setting `KBSEARCH_LOG_FILE=off` keeps logging on stdout only, which the
//! MCP binary relies on being quiet: its stdout carries protocol frames, so it routes the stdout
//! layer to stderr via [`init_tracing_stderr`].
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_ENV: &str = "KBSEARCH_LOG_FILE";

/// Configure tracing subscribers for stdout and optional file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Installs a compact stdout layer and, when available, a file layer.
/// - Keeps the non-blocking writer guard alive for the process lifetime.
pub fn init_tracing() {
    let env_filter = default_filter();
    let stdout_layer = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer() {
        registry.with(file_layer(writer)).try_init().ok();
    } else {
        registry.try_init().ok();
    }
}

/// Same as [`init_tracing`] but the console layer writes to stderr.
pub fn init_tracing_stderr() {
    let env_filter = default_filter();
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .compact();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    if let Some(writer) = configure_file_writer() {
        registry.with(file_layer(writer)).try_init().ok();
    } else {
        registry.try_init().ok();
    }
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_layer<S>(writer: NonBlocking) -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false)
        .compact()
}

/// Build a non-blocking writer for file logging.
///
/// Returns `None` when file logging is switched off, the logs directory cannot be created, or
/// the target file cannot be opened.
fn configure_file_writer() -> Option<NonBlocking> {
    match std::env::var(LOG_FILE_ENV) {
        Ok(path) if path.eq_ignore_ascii_case("off") => None,
        Ok(path) => match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                let _ = LOG_GUARD.set(guard);
                Some(non_blocking)
            }
            Err(err) => {
                eprintln!("Failed to open log file {path}: {err}");
                None
            }
        },
        Err(_) => {
            if let Err(err) = std::fs::create_dir_all("logs") {
                eprintln!("Failed to create logs directory: {err}");
                return None;
            }
            let file_appender = tracing_appender::rolling::never("logs", "kbsearch.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
    }
}
