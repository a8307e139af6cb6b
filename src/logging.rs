//! Logging setup for debugging and diagnostics.
//!
//! The engine emits `tracing` events (one per attempt, plus success and
//! give-up markers). Applications that do not already install a subscriber
//! can use [`init_logging`], which writes to stderr and honors `RUST_LOG`.

use tracing::Level;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log level for the subscriber installed by [`init_logging`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace level - most verbose; includes one event per poll.
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warning level
    Warn,
    /// Error level - least verbose
    Error,
    /// Disable logging entirely
    Off,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error | LogLevel::Off => Level::ERROR,
        }
    }
}

/// Configuration for the subscriber installed by [`init_logging`].
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use when `RUST_LOG` is not set.
    pub level: LogLevel,
    /// Whether to include timestamps.
    pub with_timestamps: bool,
    /// Whether to include the target (module path).
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamps: true,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// A configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets whether to include timestamps.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.with_timestamps = enabled;
        self
    }

    /// Sets whether to include the target (module path).
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }
}

/// Installs a global `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over the configured level when set. Calling
/// this more than once is harmless: a subscriber already installed by the
/// host application stays in place.
pub fn init_logging(config: LoggingConfig) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.level.as_directive())
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(config.with_target);

    let _ = if config.with_timestamps {
        subscriber.finish().try_init()
    } else {
        subscriber.without_time().finish().try_init()
    };
}

/// Installs the default subscriber: info level (unless `RUST_LOG` is set),
/// timestamps and targets enabled, output to stderr.
pub fn init_default_logging() {
    init_logging(LoggingConfig::default());
}
