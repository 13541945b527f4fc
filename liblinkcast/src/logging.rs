//! Logging setup shared by the Linkcast binaries
//!
//! Output always goes to stderr so stdout stays clean for JSON results.
//! `RUST_LOG` takes precedence over the configured level when set.
//!
//! # Examples
//!
//! ```no_run
//! use liblinkcast::logging::{LoggingConfig, LogFormat};
//!
//! let config = LoggingConfig::new(LogFormat::Json, "info".to_string(), false);
//! config.init();
//!
//! // Or respect LINKCAST_LOG_FORMAT / LINKCAST_LOG_LEVEL
//! liblinkcast::logging::init_default();
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Output format for log lines on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text without colors, for piping
    Text,
    /// One JSON object per line
    Json,
    /// Colored multi-line output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Configuration for logging initialization
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    /// Create a new logging configuration
    ///
    /// # Arguments
    ///
    /// * `format` - Log output format (text, json, or pretty)
    /// * `level` - Minimum level directive (error, warn, info, debug, trace)
    /// * `verbose` - Forces the `debug` level unless `RUST_LOG` is set
    ///
    /// # Example
    ///
    /// ```
    /// use liblinkcast::logging::{LogFormat, LoggingConfig};
    ///
    /// let config = LoggingConfig::new(LogFormat::Json, "warn".to_string(), false);
    /// assert_eq!(config.effective_level(), "warn");
    /// ```
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Effective level directive when `RUST_LOG` is absent
    pub fn effective_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.level
        }
    }

    /// Install the global subscriber
    ///
    /// A second call is a no-op, so tests and binaries may both call it.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.effective_level()));

        let result = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false)
                .try_init(),
        };

        if let Err(e) = result {
            tracing::debug!("Logging already initialized: {}", e);
        }
    }
}

/// Initialize logging from `LINKCAST_LOG_FORMAT` and `LINKCAST_LOG_LEVEL`
///
/// Falls back to text format at `info`.
///
/// # Examples
///
/// ```bash
/// # JSON lines at debug level from the daemon
/// export LINKCAST_LOG_FORMAT=json
/// export LINKCAST_LOG_LEVEL=debug
/// link-send --once
/// ```
pub fn init_default() {
    from_env(false).init();
}

/// Build a config from the environment, optionally forcing debug output
pub fn from_env(verbose: bool) -> LoggingConfig {
    from_env_with_level(verbose, "info")
}

/// Like [`from_env`], with a different level when `LINKCAST_LOG_LEVEL` is unset
///
/// One-shot CLIs pass `warn` so stderr stays quiet.
pub fn from_env_with_level(verbose: bool, default_level: &str) -> LoggingConfig {
    let format = std::env::var("LINKCAST_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);

    let level =
        std::env::var("LINKCAST_LOG_LEVEL").unwrap_or_else(|_| default_level.to_string());

    LoggingConfig::new(format, level, verbose)
}
