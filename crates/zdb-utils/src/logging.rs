//! # Logging Utilities
//!
//! Logging infrastructure for zdb using `tracing`.
//!
//! The plugin runs inside LLDB, which owns stdout, so the plugin logs to
//! stderr and defaults to warnings only. The CLI logs to stderr as well so its
//! reports can be piped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zdb_utils::init_logging;
//!
//! // Reads RUST_LOG, ZDB_LOG_FORMAT and ZDB_LOG_FILE
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log filter (e.g., `RUST_LOG=debug`, `RUST_LOG=zdb_core::rewriter=trace`)
//! - `ZDB_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `ZDB_LOG_FILE`: Optional path to an additional log file, rotated daily

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    Pretty,
    /// JSON format, one object per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Where console output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console
{
    Stdout,
    Stderr,
    /// File output only
    Off,
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig
{
    /// Level that overrides `RUST_LOG` (e.g. from a `--log-level` flag)
    pub level: Option<LogLevel>,
    /// Level used when neither `level` nor `RUST_LOG` is set
    pub default_level: LogLevel,
    pub format: LogFormat,
    /// Additional file output, rotated daily
    pub file: Option<PathBuf>,
    pub console: Console,
}

impl LogConfig
{
    /// Settings for the CLI, from the environment.
    pub fn from_env() -> Self
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Settings for the plugin: stderr, warnings and above unless `RUST_LOG` says otherwise.
    pub fn for_plugin() -> Self
    {
        Self {
            default_level: LogLevel::Warn,
            ..Self::from_env()
        }
    }

    /// Settings from an arbitrary variable lookup. Unknown formats fall back to pretty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self
    {
        let format = lookup("ZDB_LOG_FORMAT")
            .and_then(|s| LogFormat::from_str(&s).ok())
            .unwrap_or(LogFormat::Pretty);
        let file = lookup("ZDB_LOG_FILE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Self {
            level: None,
            default_level: LogLevel::Info,
            format,
            file,
            console: Console::Stderr,
        }
    }

    fn filter(&self) -> EnvFilter
    {
        // Priority: explicit level, then RUST_LOG (module filters allowed), then the default
        match self.level {
            Some(level) => EnvFilter::new(Level::from(level).to_string()),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Level::from(self.default_level).to_string())),
        }
    }
}

/// Keeps the file writer flushing. Dropping it stops file output.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard(Option<WorkerGuard>);

impl LoggingGuard
{
    /// Keep file logging alive for the rest of the process.
    pub fn keep(self)
    {
        std::mem::forget(self);
    }
}

/// Initialize logging from the environment
///
/// ## Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    init_with(&LogConfig::from_env())
}

/// Initialize logging with an explicit level and format
///
/// ## Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_with(&LogConfig {
        level: Some(level),
        format,
        ..LogConfig::from_env()
    })
}

/// Initialize logging inside the debugger process
///
/// Another plugin may already have installed a subscriber; that is reported as
/// an error and should be ignored by the caller.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_plugin_logging() -> Result<LoggingGuard, LoggingError>
{
    init_with(&LogConfig::for_plugin())
}

/// Install a global subscriber for `config`.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_with(config: &LogConfig) -> Result<LoggingGuard, LoggingError>
{
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    let mut guard = None;

    match config.console {
        Console::Stdout => layers.push(layer(config.format, io::stdout, true, config.filter())),
        Console::Stderr => layers.push(layer(config.format, io::stderr, true, config.filter())),
        Console::Off => {}
    }

    if let Some(file_path) = &config.file {
        let file_appender = tracing_appender::rolling::daily(
            file_path.parent().unwrap_or(Path::new(".")),
            file_path.file_name().unwrap_or_default(),
        );
        let (non_blocking, worker) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker);
        // No ANSI in files
        layers.push(layer(config.format, non_blocking, false, config.filter()));
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;

    Ok(LoggingGuard(guard))
}

fn layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(ansi)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
