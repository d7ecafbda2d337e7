//! Tracing subscriber installation.
//!
//! Events go to stderr (text or JSON) and, when `logging.file` is set, to a
//! daily-rolling file as well. `SCRIBE_LOG` takes precedence over the
//! configured level, e.g. `SCRIBE_LOG=scribe=debug,reqwest=warn`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

pub const LOG_ENV_VAR: &str = "SCRIBE_LOG";

/// Build the filter: `SCRIBE_LOG` if set and valid, else the configured level.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns the file writer's guard, which must live until exit so buffered
/// lines get flushed. Calling this again after a subscriber is installed is a
/// no-op.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            let layer = match config.format {
                LogFormat::Json => layer.json().boxed(),
                LogFormat::Text => layer.boxed(),
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(false)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(console_layer)
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    Ok(guard)
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "scribe.log".to_string());
    let appender = tracing_appender::rolling::daily(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
