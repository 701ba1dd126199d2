//! OTLP exporter construction shared by the three pipelines.
//!
//! Exporters are created lazily connected: an unreachable collector surfaces
//! later as background export failures, while a malformed endpoint fails here.
//! Construction spawns the gRPC channel worker, so it must run inside a Tokio
//! runtime (multi-threaded when batch processors are attached).

use crate::config::ExporterConfig;
use crate::error::{TelemetryError, TelemetryResult};
use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter, WithExportConfig, WithTonicConfig};
use tonic::transport::ClientTlsConfig;

fn tls_config() -> ClientTlsConfig {
    ClientTlsConfig::new().with_enabled_roots()
}

fn exporter_error(err: impl std::fmt::Display) -> TelemetryError {
    TelemetryError::Exporter(err.to_string())
}

/// OTLP/gRPC span exporter.
pub fn span_exporter(config: &ExporterConfig) -> TelemetryResult<SpanExporter> {
    let mut builder = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.endpoint_url());
    if config.tls {
        builder = builder.with_tls_config(tls_config());
    }
    builder.build().map_err(exporter_error)
}

/// OTLP/gRPC log record exporter.
pub fn log_exporter(config: &ExporterConfig) -> TelemetryResult<LogExporter> {
    let mut builder = LogExporter::builder()
        .with_tonic()
        .with_endpoint(config.endpoint_url());
    if config.tls {
        builder = builder.with_tls_config(tls_config());
    }
    builder.build().map_err(exporter_error)
}

/// OTLP/gRPC metric exporter.
pub fn metric_exporter(config: &ExporterConfig) -> TelemetryResult<MetricExporter> {
    let mut builder = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.endpoint_url());
    if config.tls {
        builder = builder.with_tls_config(tls_config());
    }
    builder.build().map_err(exporter_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MALFORMED: &str = "::not a uri::";

    #[tokio::test]
    async fn test_malformed_endpoint_is_rejected() {
        let config = ExporterConfig::new(MALFORMED, false);

        assert!(matches!(span_exporter(&config), Err(TelemetryError::Exporter(_))));
        assert!(matches!(log_exporter(&config), Err(TelemetryError::Exporter(_))));
        assert!(matches!(metric_exporter(&config), Err(TelemetryError::Exporter(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_builds_lazily() {
        let config = ExporterConfig::new("http://127.0.0.1:1", false);

        assert!(span_exporter(&config).is_ok());
        assert!(log_exporter(&config).is_ok());
        assert!(metric_exporter(&config).is_ok());
    }
}
