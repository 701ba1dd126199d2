//! Trace pipeline setup and management

use crate::{
    config::ExporterConfig,
    error::{Degradation, Signal, TelemetryError, TelemetryResult},
};
use opentelemetry::{global, trace::TracerProvider as _};
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracer, SdkTracerProvider, TracerProviderBuilder},
};

/// Instrumentation scope name of the tracer handed to wrapped handlers.
pub const TRACER_NAME: &str = "beacon";

fn base_builder(resource: Resource) -> TracerProviderBuilder {
    SdkTracerProvider::builder()
        .with_resource(resource)
        .with_id_generator(RandomIdGenerator::default())
        .with_sampler(Sampler::AlwaysOn)
}

/// Build the tracer provider with a batch OTLP exporter.
///
/// When the exporter cannot be built the provider is returned without it,
/// together with the reason; spans are still created and processed locally.
#[cfg(feature = "otlp")]
pub fn build_tracer_provider(
    resource: Resource,
    exporter: &ExporterConfig,
) -> (SdkTracerProvider, Option<Degradation>) {
    let builder = base_builder(resource);

    match crate::exporter::span_exporter(exporter) {
        Ok(exporter) => (builder.with_batch_exporter(exporter).build(), None),
        Err(err) => (builder.build(), Some(Degradation::new(Signal::Traces, err))),
    }
}

#[cfg(not(feature = "otlp"))]
pub fn build_tracer_provider(
    resource: Resource,
    _exporter: &ExporterConfig,
) -> (SdkTracerProvider, Option<Degradation>) {
    (
        base_builder(resource).build(),
        Some(Degradation::new(Signal::Traces, "built without the `otlp` feature")),
    )
}

/// Register the provider as the process-wide tracer provider.
pub fn install_tracer_provider(provider: &SdkTracerProvider) {
    global::set_tracer_provider(provider.clone());
}

/// Tracer used by instrumented handlers.
pub fn tracer(provider: &SdkTracerProvider) -> SdkTracer {
    provider.tracer(TRACER_NAME)
}

/// Shutdown tracing gracefully
pub fn shutdown_tracing(provider: &SdkTracerProvider) -> TelemetryResult<()> {
    provider
        .shutdown()
        .map_err(|e| TelemetryError::Shutdown(format!("traces: {e}")))
}
