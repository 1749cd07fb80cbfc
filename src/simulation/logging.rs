//! Logging and tracing configuration
//!
//! Console output goes to stderr so that result tables written to stdout or the
//! output directory are never interleaved with log lines.

use std::io;
use tracing::{debug, Level};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Boxed layer over the bare registry, so pretty and JSON layers can share a branch
type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Error returned when the global subscriber cannot be installed
pub type LoggingError = Box<dyn std::error::Error + Send + Sync>;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the crate
    pub level: Level,
    /// Whether console output is JSON instead of pretty text
    pub json_format: bool,
    /// Directory for daily rolling JSON log files, if any
    pub log_directory: Option<String>,
    /// Log file prefix
    pub log_file_prefix: String,
    /// Whether span enter/exit events are logged
    pub enable_span_events: bool,
    /// Whether console output uses ANSI colours
    pub enable_ansi: bool,
    /// Custom environment filter overriding `level`
    pub env_filter: Option<String>,
}

/// Keeps the non-blocking writers flushing until dropped
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            json_format: false,
            log_directory: None,
            log_file_prefix: "activity-chain-locator".to_string(),
            enable_span_events: false,
            enable_ansi: true,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Enable JSON console output
    pub fn with_json_format(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Additionally log JSON lines to a daily rolling file in `directory`
    pub fn with_file_logging(mut self, directory: impl Into<String>) -> Self {
        self.log_directory = Some(directory.into());
        self
    }

    /// Set log file prefix
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_file_prefix = prefix.into();
        self
    }

    /// Enable span events
    pub fn with_span_events(mut self) -> Self {
        self.enable_span_events = true;
        self
    }

    /// Disable ANSI colours
    pub fn without_ansi(mut self) -> Self {
        self.enable_ansi = false;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.enable_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Filter directive used when neither `env_filter` nor `RUST_LOG` is set
    pub fn default_directive(&self) -> String {
        format!("{}={}", env!("CARGO_PKG_NAME").replace('-', "_"), self.level)
    }

    fn build_filter(&self) -> Result<EnvFilter, LoggingError> {
        match &self.env_filter {
            Some(filter) => Ok(EnvFilter::try_new(filter)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.default_directive()))),
        }
    }

    /// Install the global tracing subscriber
    ///
    /// The returned guard must be held for as long as logging is needed.
    pub fn init(self) -> Result<LoggingGuard, LoggingError> {
        let filter = self.build_filter()?;
        let mut guards = Vec::new();
        let mut layers: Vec<BoxedLayer> = Vec::new();

        let (console_writer, console_guard) = non_blocking(io::stderr());
        guards.push(console_guard);

        if self.json_format {
            layers.push(
                fmt::layer()
                    .json()
                    .with_writer(console_writer)
                    .with_span_events(self.span_events())
                    .boxed(),
            );
        } else {
            layers.push(
                fmt::layer()
                    .pretty()
                    .with_writer(console_writer)
                    .with_ansi(self.enable_ansi)
                    .with_span_events(self.span_events())
                    .boxed(),
            );
        }

        if let Some(directory) = &self.log_directory {
            let (file_writer, file_guard) =
                non_blocking(rolling::daily(directory, &self.log_file_prefix));
            guards.push(file_guard);
            layers.push(
                fmt::layer()
                    .json()
                    .with_writer(file_writer)
                    .with_span_events(self.span_events())
                    .boxed(),
            );
        }

        Registry::default().with(layers).with(filter).try_init()?;

        debug!(level = %self.level, json = self.json_format, "Logging initialized");
        Ok(LoggingGuard { _guards: guards })
    }

    /// Quiet logging: warnings and errors only
    pub fn init_default() -> Result<LoggingGuard, LoggingError> {
        Self::new().init()
    }

    /// Verbose logging (INFO level with span events)
    pub fn init_verbose() -> Result<LoggingGuard, LoggingError> {
        Self::new().with_level(Level::INFO).with_span_events().init()
    }

    /// Debug logging (DEBUG level with span events)
    pub fn init_debug() -> Result<LoggingGuard, LoggingError> {
        Self::new().with_level(Level::DEBUG).with_span_events().init()
    }

    /// Production logging: JSON console output plus rolling files in `log_dir`
    pub fn init_prod(log_dir: impl Into<String>) -> Result<LoggingGuard, LoggingError> {
        Self::new()
            .with_level(Level::INFO)
            .with_json_format()
            .with_file_logging(log_dir)
            .without_ansi()
            .init()
    }
}

/// Structured log event tagged with the assignment component
#[macro_export]
macro_rules! assign_event {
    ($level:ident, $message:expr, $($key:ident = $value:expr),+ $(,)?) => {
        tracing::$level!(component = "assignment", $($key = $value,)+ "{}", $message)
    };
    ($level:ident, $message:expr) => {
        tracing::$level!(component = "assignment", "{}", $message)
    };
}
