//! Tracing subscriber initialization.
//!
//! Logs go to stderr. When `logging.directory` is set they are also written to
//! a daily-rolling file there through a non-blocking writer; keep the returned
//! guard alive for the life of the process or buffered lines are lost.

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

const LOG_FILE_PREFIX: &str = "dinnerdonebetter.log";

/// `RUST_LOG` wins over the configured filter; an unparseable configured
/// filter falls back to `info`.
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::try_new(&config.filter).unwrap_or_else(|error| {
        eprintln!("invalid logging.filter {:?}: {error}, using info", config.filter);
        EnvFilter::new("info")
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|error| {
                Error::Config(format!(
                    "cannot create log directory {}: {error}",
                    directory.display()
                ))
            })?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_env_filter(config))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|error| Error::Other(anyhow::anyhow!("failed to install tracing subscriber: {error}")))?;

    if let Some(directory) = &config.directory {
        tracing::info!(directory = %directory.display(), "writing logs to rolling files");
    }

    Ok(guard)
}
