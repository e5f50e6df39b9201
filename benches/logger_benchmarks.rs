//! Criterion benchmarks for rust_event_logger

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_event_logger::core::format::sprintf;
use rust_event_logger::prelude::*;
use rust_event_logger::Scalar;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

fn quiet() -> LogArg {
    Raw::pair("stacktrace", Value::Null).into()
}

// ============================================================================
// Entry Building Benchmarks
// ============================================================================

fn bench_entry_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("entry_building");
    group.throughput(Throughput::Elements(1));

    let logger = Logger::new(NullSink::new());
    let ambient = AmbientContext::new();

    group.bench_function("plain_message", |b| {
        b.iter(|| {
            let entry = logger.build_entry(&ambient, Severity::Informational, vec![black_box("Info message").into(), quiet()]);
            black_box(entry)
        });
    });

    group.bench_function("formatted_message", |b| {
        b.iter(|| {
            let entry = logger.build_entry(
                &ambient,
                Severity::Warning,
                vec!["took %.2f ms for %s".into(), black_box(12.5_f64).into(), "checkout".into(), quiet()],
            );
            black_box(entry)
        });
    });

    logger.persist_context(vec![Index::pair("service", "billing").into()]);
    logger.set_context(vec![Meta::pair("request", "r-42").into(), Raw::pair("facility", 16).into()]);

    group.bench_function("with_context", |b| {
        b.iter(|| {
            let entry = logger.build_entry(
                &ambient,
                Severity::Informational,
                vec!["charged".into(), Meta::pair("cents", 1250).into(), quiet()],
            );
            black_box(entry)
        });
    });

    group.bench_function("live_stacktrace", |b| {
        b.iter(|| {
            let entry = logger.build_entry(&ambient, Severity::Error, vec![black_box("Error message").into()]);
            black_box(entry)
        });
    });

    group.finish();
}

// ============================================================================
// Formatting Benchmarks
// ============================================================================

fn bench_sprintf(c: &mut Criterion) {
    let mut group = c.benchmark_group("sprintf");
    group.throughput(Throughput::Elements(1));

    let args = [Scalar::from("checkout"), Scalar::Int(42), Scalar::Float(3.14159)];

    group.bench_function("mixed", |b| {
        b.iter(|| sprintf(black_box("%s: %05d items in %.2f s"), black_box(&args)));
    });

    group.bench_function("positional", |b| {
        b.iter(|| sprintf(black_box("%2$d %1$s"), black_box(&args)));
    });

    group.finish();
}

// ============================================================================
// Sink Benchmarks
// ============================================================================

fn bench_file_sink(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_sink");
    group.throughput(Throughput::Elements(1));

    let dir = TempDir::new().expect("Failed to create temp dir");
    let line = r#"{"app":"rust","timestamp":1700000000000,"host":"localhost","severity":6,"facility":1,"message":"bench"}"#;

    let mut sink = FileSink::new(dir.path().join("bench.log"));
    group.bench_function("send", |b| {
        b.iter(|| sink.send(black_box(line)));
    });

    let logger = Arc::new(Logger::new(FileSink::new(dir.path().join("logger.log"))));
    group.bench_function("logger_info", |b| {
        let logger = Arc::clone(&logger);
        b.iter(|| logger.info(vec![black_box("Info message").into(), quiet()]));
    });

    group.finish();
}

criterion_group!(benches, bench_entry_building, bench_sprintf, bench_file_sink);
criterion_main!(benches);
