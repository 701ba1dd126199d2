// Beacon - Observability instrumentation for event-driven bots
//
// This library bootstraps OpenTelemetry trace, log and metric pipelines for a
// bot process and wraps event handlers so every invocation is traced.

// Re-export core functionality
pub use beacon_telemetry::*;

// Re-export logging
pub use beacon_log;
pub use beacon_log::{Level, LogConfig, Logger, get_logger};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        BotState, Handler, Interaction, InvocationArgs, Level, Logger, Nesting, StateHandle,
        Telemetry, TelemetryBuilder, TelemetryConfig, TelemetryError, TelemetryResult,
        get_logger, initialize,
    };
}
