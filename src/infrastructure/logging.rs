//! Logging system initialization
//!
//! - Console output and/or a daily rolling file in `logging.log_dir`
//! - Optional JSON formatting
//! - `RUST_LOG` overrides the configured level
//!
//! HTTP client internals are kept quiet unless the level is `trace`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::time::ChronoLocal, layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

pub const LOG_FILE_NAME: &str = "material-scraper.log";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Install the global subscriber. The returned guard flushes the file writer
/// on drop and must be held until the process exits.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    if !config.console_output && !config.file_output {
        anyhow::bail!("No logging output configured");
    }

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(&config.level))
            .with_context(|| format!("Invalid log level '{}'", config.level))?,
    };

    let console_layer = config.console_output.then(|| {
        let layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_target(false);
        if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    });

    let mut guard = None;
    let file_layer = if config.file_output {
        let (writer, file_guard) = file_writer(&config.log_dir)?;
        guard = Some(file_guard);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_ansi(false);
        Some(if config.json_format {
            layer
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            layer.with_target(false).boxed()
        })
    } else {
        None
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    info!(
        level = %config.level,
        json = config.json_format,
        console = config.console_output,
        file = config.file_output,
        log_dir = %config.log_dir.display(),
        "logging initialized"
    );
    Ok(guard)
}

fn file_writer(log_dir: &Path) -> Result<(non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, LOG_FILE_NAME);
    Ok(non_blocking(appender))
}

/// Filter for the configured level with dependency noise suppressed
fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.to_lowercase().contains("trace") {
        level.to_string()
    } else {
        format!("{level},reqwest=info,hyper=warn,hyper_util=warn,h2=warn,html5ever=warn,selectors=warn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        assert_eq!(filter_directives("trace"), "trace");
        let info = filter_directives(" info ");
        assert!(info.starts_with("info,"));
        assert!(info.contains("hyper=warn"));
        EnvFilter::try_new(info).unwrap();
    }

    #[test]
    fn test_no_output_is_an_error() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging(&config).is_err());
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested/logs");
        let (_writer, _guard) = file_writer(&log_dir).unwrap();
        assert!(log_dir.is_dir());
    }
}
