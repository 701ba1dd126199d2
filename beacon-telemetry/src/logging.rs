//! Log pipeline: console output, OTLP export and the `tracing` bridge

use crate::{
    config::ExporterConfig,
    error::{Degradation, Signal},
};
use beacon_log::{LogConfig, format_console_line};
use chrono::{DateTime, Local};
use opentelemetry::logs::{AnyValue, Severity};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_sdk::{
    Resource,
    error::{OTelSdkError, OTelSdkResult},
    logs::{LogBatch, LogExporter, LoggerProviderBuilder, SdkLogRecord, SdkLoggerProvider},
};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing_subscriber::prelude::*;

/// Exporter writing each record as one `<timestamp> - <SEVERITY> - <body>` line.
#[derive(Clone)]
pub struct ConsoleLogExporter {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ConsoleLogExporter {
    /// Console exporter writing to stdout.
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }

    /// Console exporter writing to an arbitrary sink.
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }
}

impl Default for ConsoleLogExporter {
    fn default() -> Self {
        Self::stdout()
    }
}

impl fmt::Debug for ConsoleLogExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleLogExporter").finish_non_exhaustive()
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity as i32 {
        ..=4 => "TRACE",
        5..=8 => "DEBUG",
        9..=12 => "INFO",
        13..=16 => "WARN",
        17..=20 => "ERROR",
        _ => "FATAL",
    }
}

fn body_text(body: Option<&AnyValue>) -> String {
    match body {
        Some(AnyValue::String(s)) => s.as_str().to_string(),
        Some(other) => format!("{other:?}"),
        None => String::new(),
    }
}

/// Render a record as a console line.
pub fn render_record(record: &SdkLogRecord) -> String {
    let timestamp: DateTime<Local> = record
        .timestamp()
        .or(record.observed_timestamp())
        .unwrap_or_else(SystemTime::now)
        .into();
    let severity = record
        .severity_text()
        .or_else(|| record.severity_number().map(severity_label))
        .unwrap_or("UNSPECIFIED");

    format_console_line(timestamp, severity, &body_text(record.body()))
}

impl LogExporter for ConsoleLogExporter {
    async fn export(&self, batch: LogBatch<'_>) -> OTelSdkResult {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| OTelSdkError::InternalFailure("console writer poisoned".into()))?;

        for (record, _scope) in batch.iter() {
            writeln!(writer, "{}", render_record(record))
                .map_err(|e| OTelSdkError::InternalFailure(e.to_string()))?;
        }

        writer
            .flush()
            .map_err(|e| OTelSdkError::InternalFailure(e.to_string()))
    }
}

fn base_builder(resource: Resource, console: ConsoleLogExporter) -> LoggerProviderBuilder {
    SdkLoggerProvider::builder()
        .with_resource(resource)
        .with_simple_exporter(console)
}

/// Build the logger provider: console processor plus batch OTLP processor.
///
/// When the OTLP exporter cannot be built the provider keeps console output
/// only, and the reason is returned.
#[cfg(feature = "otlp")]
pub fn build_logger_provider(
    resource: Resource,
    exporter: &ExporterConfig,
    console: ConsoleLogExporter,
) -> (SdkLoggerProvider, Option<Degradation>) {
    let builder = base_builder(resource, console);

    match crate::exporter::log_exporter(exporter) {
        Ok(exporter) => (builder.with_batch_exporter(exporter).build(), None),
        Err(err) => (builder.build(), Some(Degradation::new(Signal::Logs, err))),
    }
}

#[cfg(not(feature = "otlp"))]
pub fn build_logger_provider(
    resource: Resource,
    _exporter: &ExporterConfig,
    console: ConsoleLogExporter,
) -> (SdkLoggerProvider, Option<Degradation>) {
    (
        base_builder(resource, console).build(),
        Some(Degradation::new(Signal::Logs, "built without the `otlp` feature")),
    )
}

/// Subscriber routing `tracing` events (and bridged `log` records) into the
/// logger provider, filtered by the configured level.
pub fn subscriber(
    config: &LogConfig,
    provider: &SdkLoggerProvider,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(config.filter())
        .with(OpenTelemetryTracingBridge::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::logs::{LogRecord, Logger, LoggerProvider};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn console_provider(out: &Captured) -> SdkLoggerProvider {
        base_builder(
            Resource::builder().build(),
            ConsoleLogExporter::with_writer(out.clone()),
        )
        .build()
    }

    fn assert_console_line(line: &str, severity: &str, body: &str) {
        // "YYYY-MM-DD HH:MM:SS" is 19 characters.
        let (timestamp, rest) = line.split_at(19);
        assert_eq!(timestamp.len(), 19, "{line}");
        assert_eq!(&timestamp[4..5], "-", "{line}");
        assert_eq!(&timestamp[10..11], " ", "{line}");
        assert_eq!(rest, format!(" - {severity} - {body}"), "{line}");
    }

    #[test]
    fn test_severity_label() {
        assert_eq!(severity_label(Severity::Trace), "TRACE");
        assert_eq!(severity_label(Severity::Debug2), "DEBUG");
        assert_eq!(severity_label(Severity::Info), "INFO");
        assert_eq!(severity_label(Severity::Warn), "WARN");
        assert_eq!(severity_label(Severity::Error3), "ERROR");
        assert_eq!(severity_label(Severity::Fatal), "FATAL");
    }

    #[test]
    fn test_console_exporter_writes_single_lines() {
        let out = Captured::default();
        let provider = console_provider(&out);
        let logger = provider.logger("console-test");

        let mut record = logger.create_log_record();
        record.set_severity_text("WARN");
        record.set_severity_number(Severity::Warn);
        record.set_body(AnyValue::from("gateway reconnecting"));
        logger.emit(record);

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        assert_console_line(&lines[0], "WARN", "gateway reconnecting");
    }

    #[test]
    fn test_console_exporter_falls_back_to_severity_number() {
        let out = Captured::default();
        let provider = console_provider(&out);
        let logger = provider.logger("console-test");

        let mut record = logger.create_log_record();
        record.set_severity_number(Severity::Error);
        record.set_body(AnyValue::from("no text severity"));
        logger.emit(record);

        assert_console_line(&out.lines()[0], "ERROR", "no text severity");
    }

    #[test]
    fn test_tracing_events_reach_console() {
        let out = Captured::default();
        let provider = console_provider(&out);
        let config = LogConfig::default();

        tracing::subscriber::with_default(subscriber(&config, &provider), || {
            tracing::debug!("filtered out at INFO");
            tracing::info!("bot ready");
            beacon_log::get_logger("bot.commands").error("command failed");
        });

        let lines = out.lines();
        assert_eq!(lines.len(), 2, "{lines:?}");
        assert_console_line(&lines[0], "INFO", "bot ready");
        assert_console_line(&lines[1], "ERROR", "command failed");
    }

    #[tokio::test]
    async fn test_malformed_endpoint_keeps_console() {
        let out = Captured::default();
        let (provider, degradation) = build_logger_provider(
            Resource::builder().build(),
            &ExporterConfig::new("::bad uri::", false),
            ConsoleLogExporter::with_writer(out.clone()),
        );

        assert_eq!(degradation.map(|d| d.signal), Some(Signal::Logs));

        tracing::subscriber::with_default(subscriber(&LogConfig::default(), &provider), || {
            tracing::warn!("console still works");
        });
        assert_console_line(&out.lines()[0], "WARN", "console still works");
    }
}
