//! Beacon Logging
//!
//! Namespaced loggers for bot code, log levels, and the single-line console
//! format shared by every Beacon log pipeline.
//!
//! Loggers do not write anywhere on their own. They emit `tracing` events which
//! reach the console and OTLP processors once `beacon-telemetry` has installed
//! its subscriber; before that, records are dropped.
//!
//! # Usage
//!
//! ```rust
//! use beacon_log::{get_logger, Level};
//!
//! let logger = get_logger("bot.commands");
//! logger.info("hello command executed");
//! logger.log(Level::Warn, format_args!("latency high: {}ms", 420));
//! ```
//!
//! # Environment Variables
//!
//! - `LOG_LEVEL=DEBUG|INFO|WARN|ERROR` - Minimum severity forwarded (default `INFO`)
//! - `RUST_LOG` - Full `tracing` filter directives; wins over `LOG_LEVEL` when set

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

// ============================================================================
// Log Levels
// ============================================================================

/// Log level for Beacon logging.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Level {
    /// Trace level (most verbose)
    Trace = 0,
    /// Debug level
    Debug = 1,
    /// Info level
    #[default]
    Info = 2,
    /// Warning level
    Warn = 3,
    /// Error level (least verbose)
    Error = 4,
    /// Off (no logging)
    Off = 5,
}

impl Level {
    /// Parse a level name. Accepts the Python-style `WARNING` and `CRITICAL`
    /// spellings that bot deployments commonly carry in `LOG_LEVEL`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" | "critical" | "fatal" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Get level name as it appears in console lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    /// Lowercase directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => LevelFilter::TRACE,
            Level::Debug => LevelFilter::DEBUG,
            Level::Info => LevelFilter::INFO,
            Level::Warn => LevelFilter::WARN,
            Level::Error => LevelFilter::ERROR,
            Level::Off => LevelFilter::OFF,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Targets whose events would loop back into the exporters that produce them.
const MUTED_TARGETS: [&str; 5] = ["h2", "hyper", "tonic", "tower", "opentelemetry"];

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    /// Raw `RUST_LOG` directives, if any
    pub directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            directives: None,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup("LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or_default();

        let directives = lookup("RUST_LOG").filter(|s| !s.trim().is_empty());

        Self { level, directives }
    }

    /// Set the minimum level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Build the filter used by the Beacon subscriber.
    ///
    /// `RUST_LOG` directives win when present and valid; otherwise the level
    /// applies globally. Transport and SDK targets are always muted.
    pub fn filter(&self) -> EnvFilter {
        let base = self
            .directives
            .as_deref()
            .and_then(|d| EnvFilter::try_new(d).ok())
            .unwrap_or_else(|| EnvFilter::new(self.level.as_directive()));

        MUTED_TARGETS.iter().fold(base, |filter, target| {
            match format!("{target}=off").parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => filter,
            }
        })
    }
}

// ============================================================================
// Console Format
// ============================================================================

/// Timestamp layout of console lines.
pub const CONSOLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render one console line: `<timestamp> - <SEVERITY> - <body>`.
pub fn format_console_line(timestamp: DateTime<Local>, severity: &str, body: &str) -> String {
    format!(
        "{} - {} - {}",
        timestamp.format(CONSOLE_TIMESTAMP_FORMAT),
        severity,
        body
    )
}

// ============================================================================
// Logger Facade
// ============================================================================

/// A namespaced logging handle.
///
/// Cheap to clone; the name travels with every record as the `logger` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: Arc<str>,
}

/// Get a logger for the given namespace.
pub fn get_logger(name: impl AsRef<str>) -> Logger {
    Logger {
        name: Arc::from(name.as_ref()),
    }
}

impl Logger {
    /// Namespace of this logger.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log a message at the given level.
    pub fn log(&self, level: Level, message: impl fmt::Display) {
        let name = &*self.name;
        match level {
            Level::Trace => tracing::trace!(logger = name, "{message}"),
            Level::Debug => tracing::debug!(logger = name, "{message}"),
            Level::Info => tracing::info!(logger = name, "{message}"),
            Level::Warn => tracing::warn!(logger = name, "{message}"),
            Level::Error => tracing::error!(logger = name, "{message}"),
            Level::Off => {}
        }
    }

    pub fn trace(&self, message: impl fmt::Display) {
        self.log(Level::Trace, message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::Error, message);
    }
}

// ============================================================================
// Tests
// ============================================================================
