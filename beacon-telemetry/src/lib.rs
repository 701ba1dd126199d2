//! OpenTelemetry bootstrap and handler instrumentation for Beacon bots
//!
//! This crate provides:
//! - Resource detection (host architecture, host name, operating system)
//! - Trace, log and metric pipelines exporting over OTLP/gRPC
//! - Graceful degradation to local-only telemetry when exporters fail
//! - A `tracing` subscriber bridging log events into the log pipeline
//! - Handler instrumentation with span nesting, attributes and error recording
//!
//! # Examples
//!
//! ## Configuration
//!
//! ```
//! use beacon_telemetry::TelemetryConfig;
//!
//! let config = TelemetryConfig::new("ping-bot")
//!     .with_version("2.0.0")
//!     .with_endpoint("http://collector:4317");
//!
//! assert_eq!(config.service_name, "ping-bot");
//! assert_eq!(config.logs.endpoint, "http://collector:4317");
//! assert!(!config.metrics.tls);
//! ```
//!
//! ## Architecture Normalization
//!
//! ```
//! use beacon_telemetry::normalize_arch;
//!
//! assert_eq!(normalize_arch("x86_64"), "amd64");
//! assert_eq!(normalize_arch("aarch64"), "arm64");
//! assert_eq!(normalize_arch("s390x"), "s390x");
//! ```
//!
//! ## Complete Example (requires external collector)
//!
//! ```no_run
//! use beacon_telemetry::*;
//!
//! async fn ping(_: ()) -> Result<&'static str, String> {
//!     Ok("pong")
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), TelemetryError> {
//!     let telemetry = initialize(TelemetryConfig::from_env()).await?;
//!
//!     let ping = telemetry.instrumentor().instrument(ping);
//!     let _ = ping.call(()).await;
//!
//!     telemetry.shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod error;
#[cfg(feature = "otlp")]
mod exporter;
pub mod handler;
pub mod instrument;
pub mod logging;
pub mod metrics;
pub mod resource;
pub mod state;
pub mod tracing_setup;

pub use builder::*;
pub use config::*;
pub use error::{Degradation, Signal, TelemetryError, TelemetryResult};
pub use handler::{BoxFuture, BoxedHandler, Handler};
pub use instrument::{Instrument, Instrumented, Instrumentor, Nesting};
pub use logging::ConsoleLogExporter;
pub use metrics::{HandlerMetrics, Outcome};
pub use resource::{HostInfo, OsFamily, SystemResourceDetector, normalize_arch};
pub use state::{BotState, Interaction, InvocationArgs, StateHandle};

// Re-export commonly used OpenTelemetry types
pub use opentelemetry::{Context as OtelContext, KeyValue, Value, global};
