use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tracepool_core::{hash_bytes, PoolConfig, StringPool};

/// Token stream shaped like an ftrace capture: a small vocabulary repeated
/// many times.
fn gen_tokens(n: usize, vocabulary: usize) -> Vec<(Vec<u8>, u64)> {
    (0..n)
        .map(|i| {
            let token = match i % 4 {
                0 => format!("kworker/{}:{}", i % vocabulary, i % 7),
                1 => "sched_switch".to_string(),
                2 => format!("prev_comm={}", i % vocabulary),
                _ => format!("[{:03}]", i % 16),
            };
            let hash = hash_bytes(token.as_bytes());
            (token.into_bytes(), hash)
        })
        .collect()
}

fn bench_intern_repeated(c: &mut Criterion) {
    let mut group = c.benchmark_group("intern_repeated_tokens");
    for &n in &[10_000usize, 100_000] {
        let tokens = gen_tokens(n, 64);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("intern", n), &tokens, |b, tokens| {
            b.iter(|| {
                let mut pool = StringPool::default();
                for (token, hash) in tokens {
                    black_box(pool.intern(token, *hash).unwrap());
                }
                black_box(pool.len())
            })
        });
    }
    group.finish();
}

fn bench_bucket_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("intern_single_bucket");
    let tokens = gen_tokens(5_000, 2_000);
    for &threshold in &[50u32, u32::MAX] {
        let config = PoolConfig::default()
            .with_buckets(1)
            .with_fallback_threshold(threshold);
        group.bench_with_input(
            BenchmarkId::new("threshold", threshold),
            &config,
            |b, config| {
                b.iter(|| {
                    let mut pool = StringPool::new(config.clone()).unwrap();
                    for (token, hash) in &tokens {
                        black_box(pool.intern(token, *hash).unwrap());
                    }
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_intern_repeated, bench_bucket_depth);
criterion_main!(benches);
