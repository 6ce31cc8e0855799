//! Performance benchmarks for exclude construction and evaluation.
//!
//! Run with: `cargo bench --bench evaluation`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Interned leaf lookup | <200ns | DashMap read, no registration |
//! | Cached module query | <100ns | Per-node query cache hit |
//! | Query contention | Linear scaling | Multi-threaded reads |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

use exclude_kernel::{EngineConfig, ExcludeFactory, ExcludeSession, ExcludeSpec, ModuleId, QueryCacheConfig};

fn module(i: usize) -> ModuleId {
    ModuleId::new(format!("org.group{}", i % 16), format!("module{}", i))
}

/// A union of `width` groups and `width` module ids.
fn wide_union(session: &ExcludeSession, width: usize) -> ExcludeSpec {
    let specs: Vec<_> = (0..width)
        .flat_map(|i| [session.group(&format!("com.g{}", i)), session.module_id(&module(i))])
        .collect();
    session.any_of_list(&specs)
}

/// Benchmark repeated requests for already-interned leaves.
fn bench_interned_lookup(c: &mut Criterion) {
    let session = ExcludeSession::default();
    let id = module(7);
    session.module_id(&id);

    c.bench_function("interned_module_id", |b| {
        b.iter(|| session.module_id(black_box(&id)))
    });
}

/// Benchmark normalization of list unions of increasing width.
fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");

    for width in [2, 8, 32, 128] {
        let session = ExcludeSession::default();
        let specs: Vec<_> = (0..width)
            .flat_map(|i| [session.group(&format!("com.g{}", i)), session.module_id(&module(i))])
            .collect();

        group.throughput(Throughput::Elements(specs.len() as u64));
        group.bench_with_input(BenchmarkId::new("width", width), &specs, |b, specs| {
            b.iter(|| session.any_of_list(black_box(specs)))
        });
    }

    group.finish();
}

/// Benchmark module queries with each query cache mode.
fn bench_module_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("module_query");

    let modes = [
        ("unbounded", QueryCacheConfig::unbounded()),
        ("bounded", QueryCacheConfig::bounded(64)),
        ("disabled", QueryCacheConfig::disabled()),
    ];
    for (name, query_cache) in modes {
        let session = ExcludeSession::new(EngineConfig {
            query_cache,
            ..EngineConfig::default()
        });
        let spec = wide_union(&session, 64);
        let probes: Vec<_> = (0..32).map(|i| module(i * 3)).collect();

        group.throughput(Throughput::Elements(probes.len() as u64));
        group.bench_with_input(BenchmarkId::new("cache", name), &probes, |b, probes| {
            b.iter(|| {
                probes
                    .iter()
                    .filter(|m| spec.excludes_module(black_box(m)))
                    .count()
            })
        });
    }

    group.finish();
}

/// Benchmark multi-threaded queries against one composite.
fn bench_query_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_contention");

    for num_threads in [1, 2, 4, 8] {
        let session = ExcludeSession::default();
        let spec = wide_union(&session, 64);
        let probes: Arc<Vec<_>> = Arc::new((0..64).map(module).collect());

        // Warm the cache
        for m in probes.iter() {
            spec.excludes_module(m);
        }

        group.throughput(Throughput::Elements(num_threads as u64));
        group.bench_with_input(BenchmarkId::new("threads", num_threads), &num_threads, |b, &n| {
            b.iter(|| {
                let handles: Vec<_> = (0..n)
                    .map(|_| {
                        let spec = spec.clone();
                        let probes = Arc::clone(&probes);
                        thread::spawn(move || {
                            for m in probes.iter() {
                                black_box(spec.excludes_module(m));
                            }
                        })
                    })
                    .collect();

                for h in handles {
                    h.join().unwrap();
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_interned_lookup,
    bench_normalization,
    bench_module_query,
    bench_query_contention,
);
criterion_main!(benches);
