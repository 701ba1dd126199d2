//! Benchmarks for handler instrumentation
//!
//! Measures the overhead a traced invocation adds over calling the handler
//! directly.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use beacon::prelude::*;
use beacon::tracing_setup::tracer;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

#[derive(Clone)]
struct Slash(u64);

impl Interaction for Slash {
    fn user_id(&self) -> u64 {
        self.0
    }

    fn user_name(&self) -> &str {
        "bench"
    }

    fn guild_id(&self) -> Option<u64> {
        None
    }
}

impl InvocationArgs for Slash {
    fn interaction(&self) -> Option<&dyn Interaction> {
        Some(self)
    }
}

async fn ping(cmd: Slash) -> Result<u64, String> {
    Ok(cmd.0)
}

fn bench_invocation(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(InMemorySpanExporter::default())
        .build();
    let instrumentor = beacon::Instrumentor::new(tracer(&provider));
    let parent = &instrumentor.instrument(ping);
    let child = &instrumentor.nesting(Nesting::Child).wrap(ping);

    let mut group = c.benchmark_group("handler_invocation");

    group.bench_function("plain", |b| {
        b.to_async(&runtime)
            .iter(|| async move { black_box(Handler::call(&ping, Slash(1)).await) })
    });

    group.bench_function("instrumented_parent", |b| {
        b.to_async(&runtime)
            .iter(|| async move { black_box(parent.call(Slash(1)).await) })
    });

    group.bench_function("instrumented_child", |b| {
        b.to_async(&runtime)
            .iter(|| async move { black_box(child.call(Slash(1)).await) })
    });

    group.finish();
}

criterion_group!(benches, bench_invocation);
criterion_main!(benches);
