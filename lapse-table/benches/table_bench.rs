//! Criterion benchmarks for table add/value and the sweep pass.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lapse_core::TableConfig;
use lapse_table::CacheTable;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

fn bench_add(c: &mut Criterion) {
    let rt = runtime();
    let mut g = c.benchmark_group("add");
    g.throughput(Throughput::Elements(1));
    g.bench_function("add_expiring", |b| {
        let table: CacheTable<u64, u64> =
            CacheTable::with_runtime("bench", TableConfig::default(), rt.handle().clone());
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            black_box(table.add(i, Duration::from_secs(60), i)).unwrap();
        });
    });
    g.finish();
}

fn bench_value(c: &mut Criterion) {
    let rt = runtime();
    let table: CacheTable<u64, u64> =
        CacheTable::with_runtime("bench", TableConfig::default(), rt.handle().clone());
    for i in 0..10_000u64 {
        table.add(i, Duration::ZERO, i).unwrap();
    }

    let mut g = c.benchmark_group("value");
    g.throughput(Throughput::Elements(1));
    g.bench_function("value_hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i = (i + 1) % 10_000;
            black_box(table.value(&i)).unwrap();
        });
    });
    g.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let rt = runtime();
    let table: CacheTable<u64, u64> =
        CacheTable::with_runtime("bench", TableConfig::default(), rt.handle().clone());
    for i in 0..10_000u64 {
        table.add(i, Duration::from_secs(3600), i).unwrap();
    }

    let mut g = c.benchmark_group("sweep");
    g.throughput(Throughput::Elements(10_000));
    g.bench_function("sweep_10k_live", |b| {
        b.iter(|| black_box(table.sweep()));
    });
    g.finish();
}

criterion_group!(benches, bench_add, bench_value, bench_sweep);
criterion_main!(benches);
