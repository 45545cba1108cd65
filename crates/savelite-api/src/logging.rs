//! Logging configuration for SaveLite
//!
//! The engine reports through `tracing`; this module wires up a subscriber
//! for applications that do not bring their own.

use savelite_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "savelite.log";

/// Log output destination
#[derive(Debug, Clone)]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a daily-rotated file
    File(PathBuf),
    /// Output to both stdout and file
    Both(PathBuf),
}

/// Log format style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line format
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `savelite=debug`
    pub level: String,
    /// Output destination
    pub output: LogOutput,
    /// Format style
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Compact,
        }
    }
}

impl LogConfig {
    /// Info level, stdout
    pub fn info() -> Self {
        Self::default()
    }

    /// Debug level, stdout
    pub fn debug() -> Self {
        Self::default().with_level("debug")
    }

    /// Warn level, stdout
    pub fn warn() -> Self {
        Self::default().with_level("warn")
    }

    /// Log to a daily-rotated file
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::File(path.into());
        self
    }

    /// Log to stdout and a daily-rotated file
    pub fn with_both<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::Both(path.into());
        self
    }

    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the filter directive
    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    /// Build the filter; `RUST_LOG` wins over the configured level
    fn filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| Error::InvalidConfig(format!("Invalid log level '{}': {}", self.level, e)))
    }

    /// Install the global subscriber
    ///
    /// Returns the file writer guard when logging to a file; keep it alive
    /// for as long as logs should be written.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use savelite::logging::LogConfig;
    ///
    /// let _guard = LogConfig::debug().with_file("logs/savelite.log").init()?;
    /// # Ok::<(), savelite::Error>(())
    /// ```
    pub fn init(self) -> Result<Option<WorkerGuard>> {
        let filter = self.filter()?;
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match (&self.output, self.format) {
            (LogOutput::Stdout, LogFormat::Pretty) => {
                registry.with(fmt::layer().pretty()).try_init().map(|_| None)
            }
            (LogOutput::Stdout, LogFormat::Compact) => {
                registry.with(fmt::layer().compact()).try_init().map(|_| None)
            }
            (LogOutput::File(path), LogFormat::Pretty) => {
                let (writer, guard) = file_writer(path);
                registry
                    .with(fmt::layer().with_writer(writer).with_ansi(false).pretty())
                    .try_init()
                    .map(|_| Some(guard))
            }
            (LogOutput::File(path), LogFormat::Compact) => {
                let (writer, guard) = file_writer(path);
                registry
                    .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                    .try_init()
                    .map(|_| Some(guard))
            }
            (LogOutput::Both(path), _) => {
                // Both outputs share the default line format.
                let (writer, guard) = file_writer(path);
                registry
                    .with(fmt::layer())
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .try_init()
                    .map(|_| Some(guard))
            }
        };

        installed.map_err(|e| Error::InvalidConfig(format!("Logging already initialized: {}", e)))
    }
}

fn file_writer(path: &Path) -> (NonBlocking, WorkerGuard) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    let appender = tracing_appender::rolling::daily(dir, name);
    tracing_appender::non_blocking(appender)
}
