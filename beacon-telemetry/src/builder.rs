//! Telemetry builder for easy setup

use crate::{
    config::TelemetryConfig,
    error::{Degradation, TelemetryError, TelemetryResult},
    instrument::Instrumentor,
    logging::{ConsoleLogExporter, build_logger_provider, subscriber},
    metrics::{HandlerMetrics, build_meter_provider, install_meter_provider, meter, shutdown_metrics},
    resource::HostInfo,
    tracing_setup::{build_tracer_provider, install_tracer_provider, shutdown_tracing, tracer},
};
use beacon_log::Level;
use once_cell::sync::OnceCell;
use opentelemetry_sdk::{
    Resource, logs::SdkLoggerProvider, metrics::SdkMeterProvider, trace::SdkTracer,
    trace::SdkTracerProvider,
};
use std::io::Write;
use std::time::Duration;
use tracing_subscriber::util::SubscriberInitExt;

/// Set once the process-wide providers and subscriber are registered.
static INSTALLED: OnceCell<()> = OnceCell::new();

/// Telemetry system manager
pub struct Telemetry {
    config: TelemetryConfig,
    resource: Resource,
    tracer_provider: SdkTracerProvider,
    logger_provider: SdkLoggerProvider,
    meter_provider: SdkMeterProvider,
    handler_metrics: HandlerMetrics,
    degradations: Vec<Degradation>,
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("service_name", &self.config.service_name)
            .field("degradations", &self.degradations)
            .finish_non_exhaustive()
    }
}

impl Telemetry {
    /// Configuration the pipelines were built from
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Resource shared by all three pipelines
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Tracer handed to instrumented handlers
    pub fn tracer(&self) -> SdkTracer {
        tracer(&self.tracer_provider)
    }

    /// Instrumentor emitting spans and handler metrics through these pipelines
    pub fn instrumentor(&self) -> Instrumentor {
        Instrumentor::new(self.tracer()).with_metrics(self.handler_metrics.clone())
    }

    /// Signals whose OTLP export could not be set up
    pub fn degradations(&self) -> &[Degradation] {
        &self.degradations
    }

    /// Trace pipeline provider
    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.tracer_provider
    }

    /// Log pipeline provider
    pub fn logger_provider(&self) -> &SdkLoggerProvider {
        &self.logger_provider
    }

    /// Metric pipeline provider
    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.meter_provider
    }

    /// Subscriber feeding `tracing` events into the log pipeline.
    ///
    /// [`install`](Self::install) registers one globally; this is for scoped
    /// use with `tracing::subscriber::with_default`.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        subscriber(&self.config.log, &self.logger_provider)
    }

    /// Register the subscriber and providers process-wide, then report any
    /// degraded pipelines through the freshly installed log pipeline.
    ///
    /// Only one installation per process is allowed.
    pub fn install(&self) -> TelemetryResult<()> {
        INSTALLED
            .set(())
            .map_err(|_| TelemetryError::AlreadyInitialized)?;

        self.subscriber()
            .try_init()
            .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

        install_tracer_provider(&self.tracer_provider);
        install_meter_provider(&self.meter_provider);

        for degradation in &self.degradations {
            tracing::warn!(signal = %degradation.signal, "{degradation}");
        }

        tracing::info!(
            service = %self.config.service_name,
            version = %self.config.service_version,
            "OpenTelemetry initialized with endpoint: {}, TLS: {}",
            self.config.traces.endpoint,
            self.config.traces.tls
        );

        Ok(())
    }

    /// Flush pending spans, log records and metrics.
    pub fn force_flush(&self) -> TelemetryResult<()> {
        let results = [
            self.tracer_provider
                .force_flush()
                .map_err(|e| format!("traces: {e}")),
            self.logger_provider
                .force_flush()
                .map_err(|e| format!("logs: {e}")),
            self.meter_provider
                .force_flush()
                .map_err(|e| format!("metrics: {e}")),
        ];

        match results.into_iter().find_map(Result::err) {
            Some(err) => Err(TelemetryError::Exporter(err)),
            None => Ok(()),
        }
    }

    /// Shutdown telemetry gracefully
    ///
    /// Every pipeline is shut down; the first failure is reported.
    pub fn shutdown(self) -> TelemetryResult<()> {
        let traces = shutdown_tracing(&self.tracer_provider);
        let logs = self
            .logger_provider
            .shutdown()
            .map_err(|e| TelemetryError::Shutdown(format!("logs: {e}")));
        let metrics = shutdown_metrics(&self.meter_provider);

        traces.and(logs).and(metrics)
    }
}

/// Builder for telemetry setup
#[derive(Debug, Default)]
pub struct TelemetryBuilder {
    config: TelemetryConfig,
    console: Option<ConsoleLogExporter>,
    host: Option<HostInfo>,
}

impl TelemetryBuilder {
    /// Create a new telemetry builder
    pub fn new(service_name: impl Into<String>) -> Self {
        Self::default().with_config(TelemetryConfig::new(service_name))
    }

    /// Builder configured from the process environment
    pub fn from_env() -> Self {
        Self::default().with_config(TelemetryConfig::from_env())
    }

    /// Use custom configuration
    pub fn with_config(mut self, config: TelemetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Set service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.config = self.config.with_version(version);
        self
    }

    /// Set OTLP endpoint for traces, logs and metrics
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config = self.config.with_endpoint(endpoint);
        self
    }

    /// Toggle TLS towards the collector
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.config = self.config.with_tls(tls);
        self
    }

    /// Set minimum log level
    pub fn with_log_level(mut self, level: Level) -> Self {
        self.config = self.config.with_log_level(level);
        self
    }

    /// Write console log lines somewhere other than stdout
    pub fn with_console_writer<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.console = Some(ConsoleLogExporter::with_writer(writer));
        self
    }

    /// Set metric export interval
    pub fn with_metric_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.with_metric_interval(interval);
        self
    }

    /// Add a resource attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.with_attribute(key, value);
        self
    }

    /// Use known host facts instead of probing the host
    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = Some(host);
        self
    }

    /// Build the three pipelines without touching process-wide state.
    ///
    /// Exporter failures never fail the build; they are collected as
    /// [`Telemetry::degradations`]. Must run inside a Tokio runtime.
    pub async fn build(self) -> TelemetryResult<Telemetry> {
        self.config.validate()?;

        let config = self.config;
        let resource = match &self.host {
            Some(host) => config.create_resource_with(host),
            None => config.create_resource(),
        };

        let (tracer_provider, traces) = build_tracer_provider(resource.clone(), &config.traces);
        let (logger_provider, logs) = build_logger_provider(
            resource.clone(),
            &config.logs,
            self.console.unwrap_or_default(),
        );
        let (meter_provider, metrics) =
            build_meter_provider(resource.clone(), &config.metrics, config.metric_interval());

        let handler_metrics = HandlerMetrics::new(&meter(&meter_provider));
        let degradations = [traces, logs, metrics].into_iter().flatten().collect();

        Ok(Telemetry {
            config,
            resource,
            tracer_provider,
            logger_provider,
            meter_provider,
            handler_metrics,
            degradations,
        })
    }
}

/// Build telemetry from `config` and install it process-wide.
pub async fn initialize(config: TelemetryConfig) -> TelemetryResult<Telemetry> {
    let telemetry = TelemetryBuilder::default().with_config(config).build().await?;
    telemetry.install()?;
    Ok(telemetry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Signal;
    use opentelemetry::Key;

    const MALFORMED: &str = "::not a uri::";

    fn host() -> HostInfo {
        HostInfo {
            arch: "arm64".into(),
            hostname: "builder-test".into(),
            os_type: "linux".into(),
            os_name: "Alpine Linux".into(),
            os_version: "3.19".into(),
        }
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let result = TelemetryBuilder::new("").build().await;
        assert!(matches!(result, Err(TelemetryError::Config(_))));

        let result = TelemetryBuilder::new("bot")
            .with_metric_interval(Duration::ZERO)
            .build()
            .await;
        assert!(matches!(result, Err(TelemetryError::Config(_))));
    }

    #[tokio::test]
    async fn test_malformed_endpoint_degrades_every_signal() {
        let telemetry = TelemetryBuilder::new("degraded-bot")
            .with_otlp_endpoint(MALFORMED)
            .with_host(host())
            .with_console_writer(std::io::sink())
            .build()
            .await
            .expect("bootstrap must not fail on exporter errors");

        let signals: Vec<Signal> = telemetry.degradations().iter().map(|d| d.signal).collect();
        assert_eq!(signals, [Signal::Traces, Signal::Logs, Signal::Metrics]);
    }

    #[tokio::test]
    async fn test_resource_is_shared() {
        let telemetry = TelemetryBuilder::new("resource-bot")
            .with_version("4.5.6")
            .with_otlp_endpoint(MALFORMED)
            .with_attribute("deployment.environment", "test")
            .with_host(host())
            .with_console_writer(std::io::sink())
            .build()
            .await
            .unwrap();

        let resource = telemetry.resource();
        let get = |key: &'static str| {
            resource
                .get(&Key::from_static_str(key))
                .map(|v| v.to_string())
        };
        assert_eq!(get("service.name").as_deref(), Some("resource-bot"));
        assert_eq!(get("service.version").as_deref(), Some("4.5.6"));
        assert_eq!(get("service.instance.id").as_deref(), Some("builder-test"));
        assert_eq!(get("host.arch").as_deref(), Some("arm64"));
        assert_eq!(get("deployment.environment").as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn test_instrumentor_works_without_exporters() {
        use crate::handler::Handler;

        let telemetry = TelemetryBuilder::new("offline-bot")
            .with_otlp_endpoint(MALFORMED)
            .with_host(host())
            .with_console_writer(std::io::sink())
            .build()
            .await
            .unwrap();

        let wrapped = telemetry
            .instrumentor()
            .instrument(|n: u32| async move { Ok::<_, String>(n * 3) });
        assert_eq!(wrapped.call(3).await, Ok(9));
        assert!(telemetry.force_flush().is_ok());
    }

    #[tokio::test]
    async fn test_pipelines_flush_individually() {
        let telemetry = TelemetryBuilder::new("flush-bot")
            .with_otlp_endpoint(MALFORMED)
            .with_host(host())
            .with_console_writer(std::io::sink())
            .build()
            .await
            .unwrap();

        assert!(telemetry.tracer_provider().force_flush().is_ok());
        assert!(telemetry.logger_provider().force_flush().is_ok());
        assert!(telemetry.meter_provider().force_flush().is_ok());
    }
}
