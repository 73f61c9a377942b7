//! Logging system configuration and initialization
//!
//! - Console output (plain or JSON)
//! - Optional file output through a non-blocking rolling appender
//! - Local timezone timestamps
//! - Noisy dependencies capped unless the level is `trace`

use std::fs;

use anyhow::{Context, Result, bail};
use chrono::Local;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

const LOG_FILE_NAME: &str = "catalog-harvester.log";

/// Dependencies that flood debug output
const NOISY_TARGETS: [(&str, &str); 7] = [
    ("reqwest", "info"),
    ("hyper", "warn"),
    ("hyper_util", "warn"),
    ("h2", "warn"),
    ("html5ever", "warn"),
    ("selectors", "warn"),
    ("chromiumoxide", "warn"),
];

/// Local time with milliseconds
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the filter: `RUST_LOG` wins, otherwise the configured level plus
/// dependency caps and per-module overrides.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    if !config.level.eq_ignore_ascii_case("trace") {
        for (target, level) in NOISY_TARGETS {
            filter = filter.add_directive(format!("{target}={level}").parse()?);
        }
    }

    for (module, level) in &config.module_filters {
        let directive = format!("{module}={level}");
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("Invalid module filter '{directive}'"))?,
        );
    }

    Ok(filter)
}

/// Initialize the global subscriber.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// until the process exits.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    if !config.console_output && !config.file_output {
        bail!("No logging output configured");
    }

    let env_filter = build_env_filter(config)?;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.file_output {
        fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("Failed to create log directory {}", config.log_dir.display())
        })?;

        let appender = match config.rotation.as_str() {
            "hourly" => rolling::hourly(&config.log_dir, LOG_FILE_NAME),
            "never" => rolling::never(&config.log_dir, LOG_FILE_NAME),
            _ => rolling::daily(&config.log_dir, LOG_FILE_NAME),
        };
        let (writer, file_guard) = non_blocking(appender);
        guard = Some(file_guard);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_timer(LocalTimeFormatter)
            .with_ansi(false);
        if config.json_format {
            layers.push(
                file_layer
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .boxed(),
            );
        } else {
            layers.push(file_layer.with_target(false).boxed());
        }
    }

    if config.console_output {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(LocalTimeFormatter)
            .with_target(false);
        if config.json_format {
            layers.push(console_layer.json().boxed());
        } else {
            layers.push(console_layer.boxed());
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    info!(
        "Logging initialized (level: {}, json: {}, file: {})",
        config.level, config.json_format, config.file_output
    );
    if config.file_output {
        info!("Log directory: {}", config.log_dir.display());
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_filter() {
        let filter = build_env_filter(&LoggingConfig::default()).unwrap();
        let rendered = filter.to_string();
        if std::env::var("RUST_LOG").is_err() {
            assert!(rendered.contains("hyper=warn"), "{rendered}");
        }
    }

    #[test]
    fn trace_level_keeps_dependencies_verbose() {
        let config = LoggingConfig {
            level: "trace".to_string(),
            ..LoggingConfig::default()
        };
        let rendered = build_env_filter(&config).unwrap().to_string();
        if std::env::var("RUST_LOG").is_err() {
            assert!(!rendered.contains("hyper=warn"), "{rendered}");
        }
    }

    #[test]
    fn rejects_disabled_outputs() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging_with_config(&config).is_err());
    }
}
