//! Error types for Beacon telemetry

use thiserror::Error;

/// Result type alias for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Telemetry error types
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Exporter error
    #[error("Exporter error: {0}")]
    Exporter(String),

    /// Global subscriber could not be installed
    #[error("Subscriber error: {0}")]
    Subscriber(String),

    /// Global providers were already installed in this process
    #[error("Telemetry already initialized")]
    AlreadyInitialized,

    /// Shutdown error
    #[error("Shutdown error: {0}")]
    Shutdown(String),

    /// Generic error
    #[error("Telemetry error: {0}")]
    Other(String),
}

/// Telemetry signal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Traces,
    Logs,
    Metrics,
}

impl Signal {
    /// Lowercase signal name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Traces => "traces",
            Signal::Logs => "logs",
            Signal::Metrics => "metrics",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline that lost its network exporter during bootstrap.
///
/// The pipeline itself still works locally; only OTLP export is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradation {
    /// Affected signal
    pub signal: Signal,
    /// Why the exporter could not be built
    pub reason: String,
}

impl Degradation {
    /// Record a degradation for a signal.
    pub fn new(signal: Signal, reason: impl std::fmt::Display) -> Self {
        Self {
            signal,
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Display for Degradation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OTLP {} export disabled: {}", self.signal, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TelemetryError::Config("service name cannot be empty".into()).to_string(),
            "Configuration error: service name cannot be empty"
        );
        assert_eq!(
            TelemetryError::AlreadyInitialized.to_string(),
            "Telemetry already initialized"
        );
    }

    #[test]
    fn test_degradation_display() {
        let degradation = Degradation::new(Signal::Logs, "invalid URI");
        assert_eq!(
            degradation.to_string(),
            "OTLP logs export disabled: invalid URI"
        );
    }
}
