//! Benchmarks for chain throughput

use cache_chain::{CacheChain, MemoryBackend, MemoryConfig};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use tokio::runtime::Runtime;

fn create_chain(rt: &Runtime) -> CacheChain {
    rt.block_on(async {
        CacheChain::builder()
            .layer(MemoryBackend::new(MemoryConfig::named("l0")))
            .layer(MemoryBackend::new(MemoryConfig::named("l1")))
            .warm_ttl(Duration::from_secs(3600))
            .build()
            .unwrap()
    })
}

fn bench_set(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let chain = create_chain(&rt);

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("small_value", |b| {
        b.iter(|| {
            rt.block_on(async {
                chain
                    .set(black_box("key"), black_box(vec![42u8]), None)
                    .await
                    .unwrap();
            });
        });
    });

    group.bench_function("medium_value", |b| {
        let value = vec![0u8; 1024]; // 1KB
        b.iter(|| {
            rt.block_on(async {
                chain
                    .set(black_box("key"), black_box(value.clone()), None)
                    .await
                    .unwrap();
            });
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let chain = create_chain(&rt);

    // Pre-populate
    rt.block_on(async {
        chain
            .set("key", vec![42u8], Some(Duration::from_secs(3600)))
            .await
            .unwrap();
    });

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("hit_fastest_layer", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = chain.get(black_box("key")).await.unwrap();
                black_box(result);
            });
        });
    });

    group.bench_function("miss", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = chain.get(black_box("nonexistent")).await.unwrap();
                black_box(result);
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_get);
criterion_main!(benches);
