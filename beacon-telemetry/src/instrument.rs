//! Handler instrumentation.
//!
//! Wrapping a handler yields a handler of the same shape that runs each
//! invocation inside its own span:
//!
//! ```rust,ignore
//! use beacon_telemetry::{Handler, Nesting};
//!
//! let greet = telemetry.instrumentor().instrument(commands::greet);
//! let lookup = telemetry.instrumentor().nesting(Nesting::Child).wrap(db::lookup);
//!
//! greet.call(interaction).await?;
//! ```
//!
//! The span is named after the handler's qualified path, carries bot state and
//! interaction attributes, ends with status Ok or Error, and is closed on every
//! exit path including cancellation. Errors are returned to the caller
//! unchanged.

use crate::{
    error::TelemetryError,
    handler::{BoxFuture, Handler},
    metrics::{HandlerMetrics, Outcome},
    state::{InvocationArgs, StateHandle},
};
use opentelemetry::{
    Context, KeyValue,
    context::FutureExt as _,
    trace::{SpanKind, Status, TraceContextExt as _, Tracer as _},
};
use opentelemetry_sdk::trace::SdkTracer;
use opentelemetry_semantic_conventions::attribute::{EXCEPTION_MESSAGE, EXCEPTION_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// Bot account the handler runs under.
pub const BOT_USER: &str = "bot.user";
/// Number of guilds the bot is connected to.
pub const BOT_GUILD_COUNT: &str = "bot.guild_count";
/// Last path segment of the handler.
pub const COMMAND_NAME: &str = "command.name";
/// Invoking user's id.
pub const USER_ID: &str = "user.id";
/// Invoking user's display name.
pub const USER_NAME: &str = "user.name";
/// Guild id, or [`DIRECT_MESSAGE`].
pub const GUILD_ID: &str = "guild.id";
/// `guild.id` value for interactions outside a guild.
pub const DIRECT_MESSAGE: &str = "DM";

/// Where an invocation's span attaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nesting {
    /// Start a new trace for every invocation, ignoring any active span
    #[default]
    Parent,
    /// Attach under the active span; root when there is none
    Child,
}

impl Nesting {
    fn parent_context(self) -> Context {
        match self {
            Nesting::Parent => Context::new(),
            Nesting::Child => Context::current(),
        }
    }
}

impl FromStr for Nesting {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parent" => Ok(Nesting::Parent),
            "child" => Ok(Nesting::Child),
            other => Err(TelemetryError::Config(format!(
                "unknown span nesting '{other}', expected 'parent' or 'child'"
            ))),
        }
    }
}

impl fmt::Display for Nesting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nesting::Parent => f.write_str("parent"),
            Nesting::Child => f.write_str("child"),
        }
    }
}

/// Last meaningful segment of a qualified path, skipping closure markers.
///
/// `bot::commands::greet` gives `greet`; `bot::setup::{{closure}}` gives `setup`.
pub fn command_name(qualified: &str) -> &str {
    qualified
        .rsplit("::")
        .find(|segment| !segment.is_empty() && !segment.starts_with("{{"))
        .unwrap_or(qualified)
}

/// Wraps handlers so each invocation is traced.
#[derive(Debug, Clone)]
pub struct Instrumentor {
    tracer: SdkTracer,
    state: StateHandle,
    metrics: Option<Arc<HandlerMetrics>>,
}

impl Instrumentor {
    /// Instrumentor emitting spans through `tracer`.
    pub fn new(tracer: SdkTracer) -> Self {
        Self {
            tracer,
            state: StateHandle::none(),
            metrics: None,
        }
    }

    /// Read bot state from `state` on every invocation.
    pub fn with_state(mut self, state: StateHandle) -> Self {
        self.state = state;
        self
    }

    /// Record handler metrics alongside spans.
    pub fn with_metrics(mut self, metrics: HandlerMetrics) -> Self {
        self.metrics = Some(Arc::new(metrics));
        self
    }

    /// Wrap a handler with the default [`Nesting::Parent`] mode.
    pub fn instrument<H>(&self, handler: H) -> Instrumented<H> {
        self.nesting(Nesting::default()).wrap(handler)
    }

    /// Choose a nesting mode, then [`Instrument::wrap`] handlers with it.
    pub fn nesting(&self, nesting: Nesting) -> Instrument {
        Instrument {
            instrumentor: self.clone(),
            nesting,
        }
    }
}

/// An [`Instrumentor`] with a chosen nesting mode.
#[derive(Debug, Clone)]
pub struct Instrument {
    instrumentor: Instrumentor,
    nesting: Nesting,
}

impl Instrument {
    /// Wrap a handler.
    pub fn wrap<H>(&self, handler: H) -> Instrumented<H> {
        Instrumented {
            handler,
            shared: Arc::new(Shared {
                tracer: self.instrumentor.tracer.clone(),
                state: self.instrumentor.state.clone(),
                metrics: self.instrumentor.metrics.clone(),
                nesting: self.nesting,
            }),
        }
    }
}

#[derive(Debug)]
struct Shared {
    tracer: SdkTracer,
    state: StateHandle,
    metrics: Option<Arc<HandlerMetrics>>,
    nesting: Nesting,
}

/// A handler whose invocations are traced.
#[derive(Debug, Clone)]
pub struct Instrumented<H> {
    handler: H,
    shared: Arc<Shared>,
}

impl<H> Instrumented<H> {
    /// Nesting mode of this wrapper.
    pub fn nesting(&self) -> Nesting {
        self.shared.nesting
    }
}

impl<H, A> Handler<A> for Instrumented<H>
where
    H: Handler<A>,
    H::Output: Send + 'static,
    H::Error: fmt::Display + Send + 'static,
    A: InvocationArgs + 'static,
{
    type Output = H::Output;
    type Error = H::Error;
    type Future = BoxFuture<Result<H::Output, H::Error>>;

    /// Starts the span, the clock and the active count right away.
    ///
    /// In [`Nesting::Child`] mode the parent is whatever span is current when
    /// `call` runs, not when the future is first polled. A future dropped
    /// before it is polled still ends its span, with the cancelled outcome.
    fn call(&self, args: A) -> Self::Future {
        let name = self.handler.name();
        let shared = &self.shared;

        let parent = shared.nesting.parent_context();
        let span = shared
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Internal)
            .start_with_context(&shared.tracer, &parent);
        let cx = parent.with_span(span);

        // Closes the span even if enrichment or the handler panics.
        let mut guard = InvocationGuard::open(cx.clone(), name, shared.metrics.clone());
        enrich(&cx, &shared.state, name, &args);

        let invocation = {
            let _attached = cx.clone().attach();
            self.handler.call(args)
        };

        Box::pin(
            async move {
                let result = invocation.await;
                guard.finish(&result);
                result
            }
            .with_context(cx),
        )
    }

    fn name(&self) -> &'static str {
        self.handler.name()
    }
}

fn enrich(cx: &Context, state: &StateHandle, name: &str, args: &impl InvocationArgs) {
    let span = cx.span();

    if let Some(state) = state.upgrade() {
        if let Some(user) = state.current_user() {
            span.set_attribute(KeyValue::new(BOT_USER, user));
        }
        if let Some(count) = state.guild_count() {
            span.set_attribute(KeyValue::new(BOT_GUILD_COUNT, count as i64));
        }
    }

    if let Some(interaction) = args.interaction() {
        let guild = interaction
            .guild_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| DIRECT_MESSAGE.to_string());

        span.set_attribute(KeyValue::new(COMMAND_NAME, command_name(name).to_string()));
        span.set_attribute(KeyValue::new(USER_ID, interaction.user_id().to_string()));
        span.set_attribute(KeyValue::new(USER_NAME, interaction.user_name().to_string()));
        span.set_attribute(KeyValue::new(GUILD_ID, guild));
    }
}

/// Ends the span and records metrics when dropped.
///
/// Outcome stays `Cancelled` unless the handler future ran to completion.
struct InvocationGuard {
    cx: Context,
    name: &'static str,
    metrics: Option<Arc<HandlerMetrics>>,
    started: Instant,
    outcome: Outcome,
}

impl InvocationGuard {
    fn open(cx: Context, name: &'static str, metrics: Option<Arc<HandlerMetrics>>) -> Self {
        if let Some(metrics) = &metrics {
            metrics.increment_active(name);
        }

        Self {
            cx,
            name,
            metrics,
            started: Instant::now(),
            outcome: Outcome::Cancelled,
        }
    }

    fn finish<T, E: fmt::Display>(&mut self, result: &Result<T, E>) {
        let span = self.cx.span();

        match result {
            Ok(_) => {
                span.set_status(Status::Ok);
                self.outcome = Outcome::Ok;
            }
            Err(err) => {
                let message = err.to_string();
                span.add_event(
                    "exception",
                    vec![
                        KeyValue::new(EXCEPTION_TYPE, std::any::type_name::<E>()),
                        KeyValue::new(EXCEPTION_MESSAGE, message.clone()),
                    ],
                );
                span.set_status(Status::error(message));
                self.outcome = Outcome::Error;
            }
        }
    }
}

impl Drop for InvocationGuard {
    fn drop(&mut self) {
        let span = self.cx.span();

        if std::thread::panicking() && self.outcome == Outcome::Cancelled {
            span.set_status(Status::error("handler panicked"));
            self.outcome = Outcome::Error;
        }
        span.end();

        if let Some(metrics) = &self.metrics {
            metrics.decrement_active(self.name);
            metrics.record(self.name, self.outcome, self.started.elapsed());
        }
    }
}
