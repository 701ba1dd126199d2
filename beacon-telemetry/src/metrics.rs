//! Metrics collection and export

use crate::{
    config::ExporterConfig,
    error::{Degradation, Signal, TelemetryError, TelemetryResult},
};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter, MeterProvider as _, UpDownCounter},
};
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, SdkMeterProvider},
};
use std::time::Duration;

/// Instrumentation scope name of the handler meter.
pub const METER_NAME: &str = "beacon";

fn base_builder(resource: Resource) -> MeterProviderBuilder {
    SdkMeterProvider::builder().with_resource(resource)
}

/// Build the meter provider with a periodic OTLP reader.
///
/// Without a usable exporter the provider has no reader: instruments work
/// but nothing leaves the process.
#[cfg(feature = "otlp")]
pub fn build_meter_provider(
    resource: Resource,
    exporter: &ExporterConfig,
    interval: Duration,
) -> (SdkMeterProvider, Option<Degradation>) {
    use opentelemetry_sdk::metrics::PeriodicReader;

    let builder = base_builder(resource);

    match crate::exporter::metric_exporter(exporter) {
        Ok(exporter) => {
            let reader = PeriodicReader::builder(exporter)
                .with_interval(interval)
                .build();
            (builder.with_reader(reader).build(), None)
        }
        Err(err) => (builder.build(), Some(Degradation::new(Signal::Metrics, err))),
    }
}

#[cfg(not(feature = "otlp"))]
pub fn build_meter_provider(
    resource: Resource,
    _exporter: &ExporterConfig,
    _interval: Duration,
) -> (SdkMeterProvider, Option<Degradation>) {
    (
        base_builder(resource).build(),
        Some(Degradation::new(Signal::Metrics, "built without the `otlp` feature")),
    )
}

/// Register the provider as the process-wide meter provider.
pub fn install_meter_provider(provider: &SdkMeterProvider) {
    global::set_meter_provider(provider.clone());
}

/// Meter used for handler metrics.
pub fn meter(provider: &SdkMeterProvider) -> Meter {
    provider.meter(METER_NAME)
}

/// Shutdown metrics gracefully
pub fn shutdown_metrics(provider: &SdkMeterProvider) -> TelemetryResult<()> {
    provider
        .shutdown()
        .map_err(|e| TelemetryError::Shutdown(format!("metrics: {e}")))
}

/// How a handler invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Ok,
    Error,
    /// The future was dropped before completing
    Cancelled,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Error => "error",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Metrics recorded for every instrumented handler.
#[derive(Debug, Clone)]
pub struct HandlerMetrics {
    pub invocations: Counter<u64>,
    pub duration: Histogram<f64>,
    pub active: UpDownCounter<i64>,
}

impl HandlerMetrics {
    /// Create handler metrics
    pub fn new(meter: &Meter) -> Self {
        let invocations = meter
            .u64_counter("handler.invocations")
            .with_description("Total number of handler invocations")
            .build();

        let duration = meter
            .f64_histogram("handler.duration")
            .with_description("Handler duration in seconds")
            .with_unit("s")
            .build();

        let active = meter
            .i64_up_down_counter("handler.active")
            .with_description("Number of handlers currently running")
            .build();

        Self {
            invocations,
            duration,
            active,
        }
    }

    /// Record a finished invocation
    pub fn record(&self, handler: &str, outcome: Outcome, duration: Duration) {
        let attributes = [
            KeyValue::new("handler.name", handler.to_string()),
            KeyValue::new("outcome", outcome.as_str()),
        ];

        self.invocations.add(1, &attributes);
        self.duration.record(duration.as_secs_f64(), &attributes);
    }

    /// Increment running handlers
    pub fn increment_active(&self, handler: &str) {
        self.active
            .add(1, &[KeyValue::new("handler.name", handler.to_string())]);
    }

    /// Decrement running handlers
    pub fn decrement_active(&self, handler: &str) {
        self.active
            .add(-1, &[KeyValue::new("handler.name", handler.to_string())]);
    }
}
