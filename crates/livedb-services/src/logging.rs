//! Logging and tracing setup for LiveDB
//!
//! Console output for development and daily-rolling JSON files for bug
//! reports, both filtered through `RUST_LOG` when it is set.

use std::path::PathBuf;

use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_FILE_PREFIX: &str = "livedb.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for JSON log files
    pub log_dir: PathBuf,

    /// Write JSON logs to daily-rolling files
    pub enable_json_logs: bool,

    /// Pretty console output
    pub enable_console_logs: bool,

    /// Include file/line information on console lines
    pub include_location: bool,

    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            default_filter: "info,livedb_core=debug,livedb_schema=debug,livedb_schema_tools=debug,livedb_table_designer=debug,livedb_services=debug".to_string(),
        }
    }
}

impl LoggingConfig {
    /// JSON logs only, informational levels
    pub fn production() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: false,
            include_location: false,
            default_filter: "warn,livedb_services=info,livedb_table_designer=info,livedb_schema=info".to_string(),
        }
    }

    pub fn development() -> Self {
        Self::default()
    }

    /// Console only, no files
    pub fn testing() -> Self {
        Self {
            log_dir: std::env::temp_dir().join("livedb-tests"),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: true,
            default_filter: "debug".to_string(),
        }
    }
}

/// Install the global subscriber.
///
/// Fails when a global subscriber is already installed.
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let mut layers = Vec::new();

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(FmtSpan::NONE)
            .with_ansi(true)
            .pretty()
            .with_filter(env_filter.clone())
            .boxed();
        layers.push(console_layer);
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // The writer must outlive every log call
        std::mem::forget(guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "logging initialized"
    );
    Ok(())
}

/// Directory of the JSON log files
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("livedb")
        .join("logs")
}
