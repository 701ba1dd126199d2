//! Integration tests for common Beacon workflows.
//!
//! Process-wide installation can only happen once, so everything that needs
//! the global subscriber lives in a single test.

use beacon::prelude::*;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Console(Arc<Mutex<Vec<u8>>>);

impl Console {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for Console {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Bot Fixtures
// =============================================================================

struct Bot;

impl BotState for Bot {
    fn current_user(&self) -> Option<String> {
        Some("beacon#0001".to_string())
    }

    fn guild_count(&self) -> Option<usize> {
        Some(2)
    }
}

#[derive(Clone)]
struct Slash {
    user: u64,
}

impl Interaction for Slash {
    fn user_id(&self) -> u64 {
        self.user
    }

    fn user_name(&self) -> &str {
        "tester"
    }

    fn guild_id(&self) -> Option<u64> {
        Some(99)
    }
}

impl InvocationArgs for Slash {
    fn interaction(&self) -> Option<&dyn Interaction> {
        Some(self)
    }
}

async fn roll(cmd: Slash) -> Result<u64, String> {
    if cmd.user == 0 {
        return Err("anonymous users cannot roll".to_string());
    }
    get_logger("bot.dice").info(format!("user {} rolled", cmd.user));
    Ok(cmd.user % 6 + 1)
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_from_lookup() {
    let config = TelemetryConfig::from_lookup(|key| match key {
        "SERVICE_NAME" => Some("dice-bot".to_string()),
        "OTLP_URL" => Some("http://otel:4317".to_string()),
        "OTLP_TLS" => Some("yes".to_string()),
        "LOG_LEVEL" => Some("warning".to_string()),
        _ => None,
    });

    assert_eq!(config.service_name, "dice-bot");
    assert_eq!(config.traces.endpoint_url(), "https://otel:4317");
    assert_eq!(config.log.level, Level::Warn);
    assert!(config.validate().is_ok());
}

// =============================================================================
// Bootstrap and Logging
// =============================================================================

#[tokio::test]
async fn test_install_once_and_log_through_pipeline() {
    let console = Console::default();
    let config = TelemetryConfig::new("workflow-bot").with_endpoint("::not a uri::");

    let telemetry = TelemetryBuilder::default()
        .with_config(config)
        .with_console_writer(console.clone())
        .build()
        .await
        .expect("bootstrap never fails on exporter errors");
    telemetry.install().expect("first install succeeds");

    // Degradation warnings and the startup line are emitted on install.
    let startup = console.lines();
    assert!(
        startup
            .iter()
            .any(|l| l.contains(" - WARN - OTLP traces export disabled")),
        "{startup:?}"
    );
    assert!(
        startup
            .iter()
            .any(|l| l.contains(" - INFO - OpenTelemetry initialized with endpoint: ::not a uri::, TLS: false")),
        "{startup:?}"
    );

    // The Logger facade, plain `tracing` and the `log` crate all reach the console.
    get_logger("bot").warn("facade line");
    tracing::error!("tracing line");
    log::info!("log crate line");

    let lines = console.lines();
    for expected in [
        " - WARN - facade line",
        " - ERROR - tracing line",
        " - INFO - log crate line",
    ] {
        assert!(lines.iter().any(|l| l.ends_with(expected)), "{expected}: {lines:?}");
    }

    // Instrumented handlers run under the installed pipelines.
    let bot = Arc::new(Bot);
    let roll = telemetry
        .instrumentor()
        .with_state(StateHandle::new(&bot))
        .instrument(roll);
    assert_eq!(roll.call(Slash { user: 3 }).await, Ok(4));
    assert_eq!(
        roll.call(Slash { user: 0 }).await,
        Err("anonymous users cannot roll".to_string())
    );
    assert!(console.lines().iter().any(|l| l.ends_with(" - INFO - user 3 rolled")));

    // A second installation is refused.
    let again = TelemetryBuilder::new("workflow-bot")
        .with_otlp_endpoint("::not a uri::")
        .with_console_writer(std::io::sink())
        .build()
        .await
        .unwrap();
    assert!(matches!(again.install(), Err(TelemetryError::AlreadyInitialized)));
}

// =============================================================================
// Handler Wrapping
// =============================================================================

#[tokio::test]
async fn test_nesting_modes_share_the_handler_shape() {
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let instrumentor = beacon::instrument::Instrumentor::new(
        beacon::tracing_setup::tracer(&provider),
    );

    let handlers: Vec<beacon::BoxedHandler<Slash, u64, String>> = vec![
        beacon::BoxedHandler::new(instrumentor.instrument(roll)),
        beacon::BoxedHandler::new(instrumentor.nesting(Nesting::Child).wrap(roll)),
    ];

    for handler in &handlers {
        assert_eq!(handler.call(Slash { user: 5 }).await, Ok(6));
    }

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 2);
    assert!(spans.iter().all(|s| s.name.ends_with("roll")));
}
