//! Criterion micro-benchmarks for containers backed by each strategy.

use std::hint::black_box;

use cairn_bench::Strategy;
use cairn_collections::{GrowVec, HashMap, RingQueue};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

/// Benchmark: push 10K u64 values into a GrowVec.
fn bench_vec_push_10k(c: &mut Criterion) {
    let mut group = c.benchmark_group("vec_push_10k");
    for strategy in Strategy::ALL {
        group.bench_function(BenchmarkId::from_parameter(strategy.name()), |b| {
            b.iter(|| {
                let mut alloc = strategy.build().unwrap();
                let mut vec: GrowVec<u64, _> = GrowVec::new(alloc.as_mut());
                for i in 0..10_000u64 {
                    vec.push(i).unwrap();
                }
                black_box(vec.len());
            });
        });
    }
    group.finish();
}

/// Benchmark: insert then look up 5K keys in a HashMap.
fn bench_map_insert_lookup_5k(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_insert_lookup_5k");
    for strategy in Strategy::ALL {
        group.bench_function(BenchmarkId::from_parameter(strategy.name()), |b| {
            b.iter(|| {
                let mut alloc = strategy.build().unwrap();
                let mut map: HashMap<u64, _> = HashMap::new(alloc.as_mut());
                for key in 0..5_000u64 {
                    map.insert(key.wrapping_mul(2654435761)).unwrap();
                }
                let mut hits = 0usize;
                for key in 0..5_000u64 {
                    hits += map.contains(&key.wrapping_mul(2654435761)).unwrap() as usize;
                }
                black_box(hits);
            });
        });
    }
    group.finish();
}

/// Benchmark: steady-state FIFO traffic through a RingQueue.
fn bench_queue_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_cycle_10k");
    for strategy in Strategy::ALL {
        group.bench_function(BenchmarkId::from_parameter(strategy.name()), |b| {
            b.iter(|| {
                let mut alloc = strategy.build().unwrap();
                let mut queue: RingQueue<u32, _> = RingQueue::new(alloc.as_mut());
                for i in 0..10_000u32 {
                    queue.push_back(i).unwrap();
                    if i % 4 == 3 {
                        black_box(queue.pop_front().unwrap());
                    }
                }
                black_box(queue.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_vec_push_10k,
    bench_map_insert_lookup_5k,
    bench_queue_cycle
);
criterion_main!(benches);
