//! Configuration for Beacon telemetry

use crate::error::{TelemetryError, TelemetryResult};
use crate::resource::{HostInfo, SystemResourceDetector};
use beacon_log::{Level, LogConfig};
use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::{
    SERVICE_INSTANCE_ID, SERVICE_NAME, SERVICE_VERSION,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Collector endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4317";

/// Default `service.name`.
pub const DEFAULT_SERVICE_NAME: &str = "discord-bot";

/// Default `service.version`.
pub const DEFAULT_SERVICE_VERSION: &str = "1.0.0";

/// `service.instance.id` when neither `HOSTNAME` nor the host name is available.
pub const DEFAULT_INSTANCE_ID: &str = "local-instance";

/// Default periodic metric export interval.
pub const DEFAULT_METRIC_INTERVAL_SECS: u64 = 60;

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Explicit instance id; derived from the host when unset
    pub instance_id: Option<String>,

    /// Log level and filter directives
    pub log: LogConfig,

    /// Span exporter
    pub traces: ExporterConfig,

    /// Log record exporter
    pub logs: ExporterConfig,

    /// Metric exporter
    pub metrics: ExporterConfig,

    /// Metrics export interval in seconds
    pub metric_interval_secs: u64,

    /// Additional resource attributes
    pub resource_attributes: Vec<(String, String)>,
}

/// Where and how one signal is exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Collector endpoint
    pub endpoint: String,

    /// Use TLS towards the collector
    pub tls: bool,
}

impl ExporterConfig {
    /// Create an exporter configuration.
    pub fn new(endpoint: impl Into<String>, tls: bool) -> Self {
        Self {
            endpoint: endpoint.into(),
            tls,
        }
    }

    /// Endpoint with the scheme matching the TLS flag.
    ///
    /// `http://` is upgraded to `https://` when TLS is on; an explicit scheme
    /// is otherwise left alone.
    pub fn endpoint_url(&self) -> String {
        match self.endpoint.strip_prefix("http://") {
            Some(rest) if self.tls => format!("https://{rest}"),
            _ => self.endpoint.clone(),
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, false)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_version: DEFAULT_SERVICE_VERSION.to_string(),
            instance_id: None,
            log: LogConfig::default(),
            traces: ExporterConfig::default(),
            logs: ExporterConfig::default(),
            metrics: ExporterConfig::default(),
            metric_interval_secs: DEFAULT_METRIC_INTERVAL_SECS,
            resource_attributes: Vec::new(),
        }
    }
}

/// Parse a boolean flag the way shell environments spell it.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl TelemetryConfig {
    /// Create a new configuration with a service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Read configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `OTLP_URL` | `http://localhost:4317` |
    /// | `OTLP_TRACES_URL`, `OTLP_LOGS_URL`, `OTLP_METRICS_URL` | `OTLP_URL` |
    /// | `OTLP_TLS` | `false` |
    /// | `SERVICE_NAME` | `discord-bot` |
    /// | `SERVICE_VERSION` | `1.0.0` |
    /// | `LOG_LEVEL` | `INFO` |
    /// | `HOSTNAME` | host name, then `local-instance` |
    /// | `METRIC_EXPORT_INTERVAL_SECS` | `60` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let endpoint = get("OTLP_URL").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let tls = get("OTLP_TLS")
            .and_then(|v| parse_flag(&v))
            .unwrap_or(false);
        let signal = |key: &str| ExporterConfig::new(get(key).unwrap_or(endpoint.clone()), tls);

        Self {
            service_name: get("SERVICE_NAME").unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            service_version: get("SERVICE_VERSION")
                .unwrap_or_else(|| DEFAULT_SERVICE_VERSION.to_string()),
            instance_id: get("HOSTNAME"),
            log: LogConfig::from_lookup(&lookup),
            traces: signal("OTLP_TRACES_URL"),
            logs: signal("OTLP_LOGS_URL"),
            metrics: signal("OTLP_METRICS_URL"),
            metric_interval_secs: get("METRIC_EXPORT_INTERVAL_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_METRIC_INTERVAL_SECS),
            resource_attributes: Vec::new(),
        }
    }

    /// Set service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Set service instance id
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Point every signal at one collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.traces.endpoint = endpoint.clone();
        self.logs.endpoint = endpoint.clone();
        self.metrics.endpoint = endpoint;
        self
    }

    /// Toggle TLS for every signal
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.traces.tls = tls;
        self.logs.tls = tls;
        self.metrics.tls = tls;
        self
    }

    /// Set minimum log level
    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log.level = level;
        self
    }

    /// Set metric export interval
    pub fn with_metric_interval(mut self, interval: Duration) -> Self {
        self.metric_interval_secs = interval.as_secs();
        self
    }

    /// Add a resource attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource_attributes.push((key.into(), value.into()));
        self
    }

    /// Metric export interval
    pub fn metric_interval(&self) -> Duration {
        Duration::from_secs(self.metric_interval_secs)
    }

    /// Create the OpenTelemetry resource for this process.
    pub fn create_resource(&self) -> Resource {
        self.create_resource_with(&HostInfo::detect())
    }

    /// Create the resource from already-detected host facts.
    ///
    /// Service identity and custom attributes override detected keys.
    pub fn create_resource_with(&self, host: &HostInfo) -> Resource {
        let instance_id = self
            .instance_id
            .clone()
            .or_else(|| (!host.hostname.is_empty()).then(|| host.hostname.clone()))
            .unwrap_or_else(|| DEFAULT_INSTANCE_ID.to_string());

        let mut attributes = vec![
            KeyValue::new(SERVICE_NAME, self.service_name.clone()),
            KeyValue::new(SERVICE_VERSION, self.service_version.clone()),
            KeyValue::new(SERVICE_INSTANCE_ID, instance_id),
        ];

        for (key, value) in &self.resource_attributes {
            attributes.push(KeyValue::new(key.clone(), value.clone()));
        }

        Resource::builder()
            .with_detector(Box::new(SystemResourceDetector::with_host(host.clone())))
            .with_attributes(attributes)
            .build()
    }

    /// Validate configuration
    pub fn validate(&self) -> TelemetryResult<()> {
        if self.service_name.trim().is_empty() {
            return Err(TelemetryError::Config(
                "Service name cannot be empty".to_string(),
            ));
        }

        for (signal, exporter) in [
            ("traces", &self.traces),
            ("logs", &self.logs),
            ("metrics", &self.metrics),
        ] {
            if exporter.endpoint.trim().is_empty() {
                return Err(TelemetryError::Config(format!(
                    "OTLP endpoint for {signal} cannot be empty"
                )));
            }
        }

        if self.metric_interval_secs == 0 {
            return Err(TelemetryError::Config(
                "Metric export interval must be at least one second".to_string(),
            ));
        }

        Ok(())
    }
}
