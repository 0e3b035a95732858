//! Bucketing benchmarks
//!
//! - Stable hash over bucket counts
//! - Cold decision (flag lookups, window, hash)
//! - Cached decision (request cache hit)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use experiment_flags::experiment::{ExperimentKeyValue, MemoryConfigStore, ENROLLMENT_START};
use experiment_flags::hash::{BucketHasher, Sha256BucketHasher};
use experiment_flags::{
    CourseKey, Experiment, ExperimentBucketer, MemoryFlagStore, MemorySessionStore,
    RequestContext, Site, User,
};
use std::sync::Arc;

fn bucketer(num_buckets: u32) -> ExperimentBucketer {
    let experiment = Experiment::builder("experiments", "bench")
        .num_buckets(num_buckets)
        .experiment_id(0)
        .build()
        .unwrap();
    let flags = Arc::new(MemoryFlagStore::new());
    flags.set_global("experiments.bench", Some(true));
    let config = Arc::new(MemoryConfigStore::new());
    config.add_key_value(ExperimentKeyValue::new(0, ENROLLMENT_START, "2012-01-06"));

    ExperimentBucketer::builder(experiment)
        .flags(flags)
        .config(config)
        .build()
}

fn context(id: u64) -> RequestContext {
    RequestContext::new(
        User::new(id, format!("user{id}")),
        Site::new("example.com"),
        Arc::new(MemorySessionStore::new()),
    )
}

/// Benchmark the stable hash
fn bench_stable_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("stable_hash");
    let hasher = Sha256BucketHasher;

    for num_buckets in [2u32, 20, 1_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_buckets),
            num_buckets,
            |b, &n| {
                b.iter(|| black_box(hasher.hash_group("experiments.bench.a/b/c", "user42", n)));
            },
        );
    }

    group.finish();
}

/// Benchmark a decision that misses the request cache
fn bench_cold_decision(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold_decision");
    let course = CourseKey::new("a/b/c").unwrap();

    for num_buckets in [2u32, 20].iter() {
        let bucketer = bucketer(*num_buckets);
        let ctx = context(42);

        group.bench_with_input(BenchmarkId::from_parameter(num_buckets), num_buckets, |b, _| {
            b.iter(|| {
                ctx.cache().clear_all_namespaces();
                black_box(bucketer.get_bucket(Some(&ctx), Some(&course), false))
            });
        });
    }

    group.finish();
}

/// Benchmark a decision served from the request cache
fn bench_cached_decision(c: &mut Criterion) {
    let bucketer = bucketer(2);
    let ctx = context(42);
    let course = CourseKey::new("a/b/c").unwrap();
    bucketer.get_bucket(Some(&ctx), Some(&course), false);

    c.bench_function("cached_decision", |b| {
        b.iter(|| black_box(bucketer.get_bucket(Some(&ctx), Some(&course), false)));
    });
}

criterion_group!(
    benches,
    bench_stable_hash,
    bench_cold_decision,
    bench_cached_decision
);
criterion_main!(benches);
