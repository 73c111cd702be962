//! Benchmarks for TableProfiler on wide tables.

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use term_profiler::executor::DataFusionExecutor;
use term_profiler::profiler::TableProfiler;
use term_profiler::schema::TableIdentifier;
use term_profiler::test_fixtures::{create_mixed_types_context, create_wide_context};
use tokio::runtime::Runtime;

fn bench_concurrency_levels(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let ctx = rt.block_on(create_wide_context(32, 20_000)).unwrap();
    let executor = DataFusionExecutor::shared(ctx);
    let table = TableIdentifier::parse("wide").unwrap();

    let mut group = c.benchmark_group("wide_table_concurrency");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for workers in [1usize, 2, 4, 8] {
        let profiler = TableProfiler::builder().max_concurrency(workers).build();
        group.bench_with_input(
            BenchmarkId::new("columns_32", workers),
            &profiler,
            |b, profiler| {
                b.iter(|| {
                    rt.block_on(profiler.profile(black_box(executor.clone()), black_box(&table)))
                });
            },
        );
    }

    group.finish();
}

fn bench_table_width(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let table = TableIdentifier::parse("wide").unwrap();
    let profiler = TableProfiler::new();

    let mut group = c.benchmark_group("table_width");
    group.measurement_time(Duration::from_secs(8));
    group.sample_size(20);

    for columns in [4usize, 16, 64] {
        let ctx = rt.block_on(create_wide_context(columns, 5_000)).unwrap();
        let executor = DataFusionExecutor::shared(ctx);

        group.bench_with_input(
            BenchmarkId::new("rows_5000", columns),
            &executor,
            |b, executor| {
                b.iter(|| {
                    rt.block_on(profiler.profile(black_box(executor.clone()), black_box(&table)))
                });
            },
        );
    }

    group.finish();
}

fn bench_mixed_types(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let ctx = rt.block_on(create_mixed_types_context()).unwrap();
    let profiler = TableProfiler::new();

    c.bench_function("mixed_types_profile", |b| {
        b.iter(|| rt.block_on(profiler.profile_session(black_box(&ctx), black_box("mixed"))));
    });
}

criterion_group!(
    benches,
    bench_concurrency_levels,
    bench_table_width,
    bench_mixed_types
);
criterion_main!(benches);
