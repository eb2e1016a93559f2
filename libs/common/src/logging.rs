//! Logging bootstrap shared by ingest tools
//!
//! Console output uses a compact `timestamp [LEVEL] message` format. An
//! optional daily rolling file (plain or JSON) is written through a
//! non-blocking appender whose guard is returned to the caller.

use std::path::PathBuf;

use errors::{IngestError, IngestResult};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{
        self,
        format::Writer,
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809123Z [INFO] decoded 120 records`
pub struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    pub level: String,
    /// Directory for the daily rolling log file; console only when absent
    pub log_dir: Option<PathBuf>,
    /// Write the file layer as JSON lines
    pub json: bool,
    /// Colorize console output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            json: false,
            ansi: true,
        }
    }
}

/// Keeps the non-blocking file writer alive; drop flushes pending lines.
#[must_use = "dropping the guard stops the file writer"]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Build the filter directive: `RUST_LOG` wins, otherwise the configured
/// level with the service's own target one notch more verbose.
fn filter_directive(service_name: &str, level: &str, rust_log: Option<String>) -> String {
    match rust_log {
        Some(env) if !env.trim().is_empty() => env,
        _ => {
            let target = service_name.replace('-', "_");
            if level.eq_ignore_ascii_case("info") {
                format!("info,{}=debug", target)
            } else {
                level.to_string()
            }
        },
    }
}

/// Initialize the global subscriber
///
/// Fails when the filter directive is invalid, the log directory cannot be
/// created, or a global subscriber is already installed.
pub fn init_logging(service_name: &str, config: &LoggingConfig) -> IngestResult<LogGuard> {
    let directive = filter_directive(service_name, &config.level, std::env::var("RUST_LOG").ok());
    let env_filter = EnvFilter::try_new(&directive).map_err(|e| IngestError::InvalidConfig {
        field: "logging.level".to_string(),
        reason: format!("invalid filter '{}': {}", directive, e),
    })?;

    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr)
        .event_format(BracketedLevelFormat)
        .boxed();

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", service_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = if config.json {
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_level(true)
                    .with_target(true)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed()
            };
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| IngestError::Internal(format!("logging already initialized: {}", e)))?;

    tracing::debug!("Logging: {} filter={}", service_name, directive);
    if let Some(dir) = &config.log_dir {
        tracing::info!("Log file: {}/{}.log.<date>", dir.display(), service_name);
    }

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(&Level::INFO), "[INFO]");
        assert_eq!(format_level(&Level::ERROR), "[ERROR]");
        assert_eq!(format_level(&Level::TRACE), "[TRACE]");
    }

    #[test]
    fn test_filter_directive_prefers_rust_log() {
        let directive = filter_directive("ingestctl", "info", Some("warn".to_string()));
        assert_eq!(directive, "warn");
    }

    #[test]
    fn test_filter_directive_default_info() {
        assert_eq!(
            filter_directive("ingest-codecs", "info", None),
            "info,ingest_codecs=debug"
        );
        assert_eq!(filter_directive("ingestctl", "trace", None), "trace");
        assert_eq!(
            filter_directive("ingestctl", "debug", Some("  ".to_string())),
            "debug"
        );
    }

    #[test]
    fn test_logging_config_defaults_from_partial_yaml() {
        let config: LoggingConfig = serde_yaml::from_str("json: true\n").unwrap();
        assert!(config.json);
        assert_eq!(config.level, "info");
        assert!(config.log_dir.is_none());
        assert!(config.ansi);
    }
}
