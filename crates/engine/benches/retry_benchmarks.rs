//! Retry Overhead Benchmarks
//!
//! Measures what the retry layer adds around an operation:
//! - classification of a failed attempt
//! - backoff computation, with and without fuzz
//! - a full invocation on the happy path and with conflicts

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use txretry_concurrency::{CancellationToken, Cancelled};
use txretry_core::{classify, RetryableKinds, TxnError};
use txretry_engine::{
    BackoffPolicy, Direct, Pause, RetryCoordinator, RetryDefaults, RetryOptions, ThreadRngFuzz,
};

/// Pause that returns immediately
struct NoPause;

impl Pause for NoPause {
    fn pause(&self, _: Duration, _: Option<&CancellationToken>) -> Result<(), Cancelled> {
        Ok(())
    }
}

fn bench_coordinator() -> RetryCoordinator {
    RetryCoordinator::new()
        .without_logger()
        .with_pause(Arc::new(NoPause))
        .with_defaults(RetryDefaults::default())
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let empty = RetryableKinds::new();
    let registered: RetryableKinds = ["deadlock_detected", "lock_timeout", "too_many_connections"]
        .into_iter()
        .collect();

    let conflict = TxnError::conflict("could not serialize access");
    let deadlock = TxnError::database("deadlock_detected", "cycle");

    group.bench_function("isolation_conflict", |b| {
        b.iter(|| black_box(classify(&conflict, &empty)));
    });
    group.bench_function("registered_kind", |b| {
        b.iter(|| black_box(classify(&deadlock, &registered)));
    });
    group.bench_function("unregistered_kind", |b| {
        b.iter(|| black_box(classify(&deadlock, &empty)));
    });
    group.finish();
}

fn bench_backoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff");
    let plain = BackoffPolicy::default();
    let fuzzed = BackoffPolicy::new(txretry_engine::backoff::default_schedule(), true);
    let fuzz = ThreadRngFuzz;

    for attempt in [1usize, 4, 10] {
        group.bench_with_input(BenchmarkId::new("plain", attempt), &attempt, |b, &n| {
            b.iter(|| black_box(plain.compute_wait(n, &fuzz)));
        });
        group.bench_with_input(BenchmarkId::new("fuzzed", attempt), &attempt, |b, &n| {
            b.iter(|| black_box(fuzzed.compute_wait(n, &fuzz)));
        });
    }
    group.finish();
}

fn bench_invocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("invocation");
    group.throughput(Throughput::Elements(1));
    let coordinator = bench_coordinator();
    let conn = Direct::<TxnError>::new();
    let options = RetryOptions::new().fuzz(false);

    group.bench_function("first_attempt_success", |b| {
        b.iter(|| black_box(coordinator.run(&conn, &options, || Ok::<_, TxnError>(1u64))));
    });

    for conflicts in [1usize, 3] {
        group.bench_with_input(
            BenchmarkId::new("conflicts_then_success", conflicts),
            &conflicts,
            |b, &conflicts| {
                b.iter(|| {
                    let mut calls = 0;
                    let result = coordinator.run(&conn, &options, || {
                        calls += 1;
                        if calls <= conflicts {
                            Err(TxnError::conflict("x"))
                        } else {
                            Ok(calls)
                        }
                    });
                    black_box(result)
                });
            },
        );
    }

    group.bench_function("nested_success", |b| {
        b.iter(|| {
            black_box(coordinator.run(&conn, &options, || {
                coordinator.run(&conn, &options, || Ok::<_, TxnError>(2u64))
            }))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_classify, bench_backoff, bench_invocation);
criterion_main!(benches);
