//! Tracing subscriber setup.
//!
//! Every binary calls [`init_logging`] once, early in `main`, and keeps the
//! returned [`LoggingGuards`] alive until exit so buffered file output is
//! flushed.

use crate::config::{LogFormat, LogSettings};
use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("failed to create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("global tracing subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter directive when RUST_LOG is unset.
    pub level: String,
    /// Use `level` even when RUST_LOG is set.
    pub force_level: bool,
    pub format: LogFormat,
    /// Write human or JSON output to stderr.
    pub stderr: bool,
    /// Daily-rolling log file directory.
    pub file_dir: Option<PathBuf>,
    /// File name prefix for rolled files.
    pub file_prefix: String,
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            force_level: false,
            format: LogFormat::Pretty,
            stderr: false,
            file_dir: None,
            file_prefix: "sphere-boot.log".to_string(),
        }
    }

    pub fn from_settings(settings: &LogSettings) -> Self {
        let mut config = Self::new(settings.level.clone()).with_format(settings.format);
        config.file_dir = settings.dir.clone();
        config
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    /// Pin the filter to `level`, ignoring RUST_LOG.
    pub fn with_forced_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self.force_level = true;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// RUST_LOG wins over the configured level unless the level is forced.
    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        if !self.force_level {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }
        EnvFilter::try_new(&self.level).map_err(|e| LoggingError::InvalidFilter {
            filter: self.level.clone(),
            reason: e.to_string(),
        })
    }
}

/// Keeps non-blocking writers alive. Drop at process exit.
#[must_use = "dropping the guards stops file logging"]
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

/// Install the global tracing subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards, LoggingError> {
    let filter = config.filter()?;
    let mut guards = Vec::new();

    let pretty_layer = (config.stderr && config.format == LogFormat::Pretty).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });
    let json_layer = (config.stderr && config.format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
    });

    let file_layer = match &config.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::LogDir {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_thread_ids(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuards { _guards: guards })
}
