//! Throughput benchmarks for cost-weighted layout caching.
//!
//! Values stand in for laid-out text runs and cost their glyph buffer size
//! in bytes.  Where a comparison is useful, Moka runs the same workload with
//! a weigher so both caches enforce the same byte budget.
//!
//! Run with:
//!     cargo bench --bench throughput

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use layoutcache::key::KeyBuildHasher;
use layoutcache::lifecycle::{LifecycleEvent, LocalNotificationCenter};
use layoutcache::{CacheBuilder, InterfaceStyle, Key, RendererCache, Size};
use moka::sync::Cache as MokaCache;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;

/// Byte budget shared by every cache under test.
const BUDGET: u64 = 4 * 1024 * 1024;

/// Distinct runs in the workload; roughly four budgets' worth of glyphs.
const RUNS: usize = 32_768;

const OPS: u64 = 1_000;

struct Run {
    glyphs: Vec<u32>,
}

impl Run {
    fn cost(&self) -> u64 {
        (self.glyphs.len() * std::mem::size_of::<u32>()) as u64
    }
}

/// Keys and glyph counts for the workload, identical across runs.
fn workload() -> Vec<(Key<u32>, usize)> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..RUNS as u32)
        .map(|id| {
            let style = if id % 3 == 0 { InterfaceStyle::Dark } else { InterfaceStyle::Light };
            let width = rng.gen_range(40..800) as f64;
            (Key::new(style, id, Size::new(width, 18.0)), rng.gen_range(4..256))
        })
        .collect()
}

fn layout_cache(center: Arc<LocalNotificationCenter>) -> RendererCache<u32, Run> {
    CacheBuilder::new("bench", BUDGET)
        .notification_center(center)
        .build_with_hasher(KeyBuildHasher)
        .unwrap()
}

fn moka_cache() -> MokaCache<Key<u32>, Arc<Run>> {
    MokaCache::builder()
        .max_capacity(BUDGET)
        .weigher(|_key: &Key<u32>, run: &Arc<Run>| run.cost() as u32)
        .build()
}

fn run_of(glyphs: usize) -> Run {
    Run { glyphs: vec![0; glyphs] }
}

// Lookups that build their key from scratch, as a renderer does per draw.
fn bench_composite_key_lookup(c: &mut Criterion) {
    let work = workload();
    let cache = layout_cache(Arc::new(LocalNotificationCenter::new()));
    // Only a budget's worth of the workload is resident.
    for (key, glyphs) in work.iter().take(RUNS / 8) {
        let run = run_of(*glyphs);
        let cost = run.cost();
        cache.insert(key.clone(), run, cost);
    }

    let mut group = c.benchmark_group("composite_key_lookup");
    group.throughput(Throughput::Elements(OPS));
    group.bench_function("layoutcache", |b| {
        let mut i = 0usize;
        b.iter(|| {
            for _ in 0..OPS {
                let (key, _) = &work[i % (RUNS / 8)];
                let probe = Key::new(key.interface_style(), *key.attributes(), key.constrained_size());
                black_box(cache.lookup(black_box(&probe)));
                i += 1;
            }
        })
    });
    group.finish();
}

// Inserts with variable cost over a working set larger than the budget, so
// overflow compaction runs continuously.
fn bench_weighted_insert(c: &mut Criterion) {
    let work = workload();
    let mut group = c.benchmark_group("weighted_insert");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("layoutcache", |b| {
        let cache = layout_cache(Arc::new(LocalNotificationCenter::new()));
        let mut i = 0usize;
        b.iter(|| {
            for _ in 0..OPS {
                let (key, glyphs) = &work[i % RUNS];
                let run = run_of(*glyphs);
                let cost = run.cost();
                cache.insert(key.clone(), run, cost);
                i += 1;
            }
        })
    });

    group.bench_function("moka_weigher", |b| {
        let cache = moka_cache();
        let mut i = 0usize;
        b.iter(|| {
            for _ in 0..OPS {
                let (key, glyphs) = &work[i % RUNS];
                cache.insert(key.clone(), Arc::new(run_of(*glyphs)));
                i += 1;
            }
        })
    });

    group.finish();
}

// Reaction time to the host signals on a full cache.
fn bench_signals(c: &mut Criterion) {
    let work = workload();
    let mut group = c.benchmark_group("signals");

    for (name, event) in [
        ("low_memory", LifecycleEvent::LowMemory),
        ("entered_background", LifecycleEvent::EnteredBackground),
    ] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let center = Arc::new(LocalNotificationCenter::new());
                    let cache = layout_cache(Arc::clone(&center));
                    for (key, glyphs) in &work {
                        let run = run_of(*glyphs);
                        let cost = run.cost();
                        cache.insert(key.clone(), run, cost);
                    }
                    (center, cache)
                },
                |(center, cache)| {
                    center.post(event);
                    black_box(cache.total_cost());
                    (center, cache)
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

// Four renderer threads sharing one cache: three lookups per insert.
fn bench_shared_renderers(c: &mut Criterion) {
    const THREADS: usize = 4;
    let work = workload();
    let mut group = c.benchmark_group("shared_renderers");
    group.throughput(Throughput::Elements(THREADS as u64 * OPS));

    let cache = layout_cache(Arc::new(LocalNotificationCenter::new()));
    group.bench_function("layoutcache", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for t in 0..THREADS {
                    let (cache, work) = (&cache, &work);
                    s.spawn(move || {
                        for j in 0..OPS as usize {
                            let (key, glyphs) = &work[(t * 7_919 + j * 31) % RUNS];
                            if j % 4 == 0 {
                                let run = run_of(*glyphs);
                                let cost = run.cost();
                                cache.insert(key.clone(), run, cost);
                            } else {
                                black_box(cache.lookup(key));
                            }
                        }
                    });
                }
            })
        })
    });

    let moka = moka_cache();
    group.bench_function("moka_weigher", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for t in 0..THREADS {
                    let (moka, work) = (&moka, &work);
                    s.spawn(move || {
                        for j in 0..OPS as usize {
                            let (key, glyphs) = &work[(t * 7_919 + j * 31) % RUNS];
                            if j % 4 == 0 {
                                moka.insert(key.clone(), Arc::new(run_of(*glyphs)));
                            } else {
                                black_box(moka.get(key));
                            }
                        }
                    });
                }
            })
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_composite_key_lookup,
    bench_weighted_insert,
    bench_signals,
    bench_shared_renderers,
);
criterion_main!(benches);
