//! Reproduces the benchmark harness's workload × pattern matrix: four
//! size buckets (`small`, `medium`, `large`, `random`) each driven in
//! three patterns (`simple` = alloc-then-free, `shuffle` = alloc-all
//! then free in permuted order, `random` = interleaved alloc/free).

use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use slabcore::SlabAllocator;
use std::hint::black_box;
use std::ptr::NonNull;

#[derive(Clone, Copy)]
struct Workload {
    name: &'static str,
    size_range: (usize, usize),
    count: usize,
}

const WORKLOADS: &[Workload] = &[
    Workload { name: "small", size_range: (1, 32), count: 2_000 },
    Workload { name: "medium", size_range: (128, 4096), count: 2_000 },
    Workload { name: "large", size_range: (4096, 1 << 20), count: 500 },
    Workload { name: "random", size_range: (1, 1 << 16), count: 2_000 },
];

fn sizes_for(workload: Workload, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..workload.count).map(|_| rng.gen_range(workload.size_range.0..=workload.size_range.1)).collect()
}

fn bench_simple(c: &mut Criterion) {
    let mut group = c.benchmark_group("simple");
    for workload in WORKLOADS {
        let sizes = sizes_for(*workload, 1);
        group.bench_function(workload.name, |b| {
            b.iter(|| {
                let mut alloc = SlabAllocator::new();
                for &size in &sizes {
                    let ptr = alloc.allocate(size, 0).unwrap();
                    black_box(ptr);
                    unsafe { alloc.deallocate(ptr) };
                }
            });
        });
    }
    group.finish();
}

fn bench_shuffle(c: &mut Criterion) {
    let mut group = c.benchmark_group("shuffle");
    for workload in WORKLOADS {
        let sizes = sizes_for(*workload, 2);
        group.bench_function(workload.name, |b| {
            b.iter(|| {
                let mut alloc = SlabAllocator::new();
                let mut ptrs: Vec<NonNull<u8>> =
                    sizes.iter().map(|&size| alloc.allocate(size, 0).unwrap()).collect();
                let mut rng = StdRng::seed_from_u64(128648432);
                ptrs.shuffle(&mut rng);
                for ptr in ptrs {
                    black_box(ptr);
                    unsafe { alloc.deallocate(ptr) };
                }
            });
        });
    }
    group.finish();
}

fn bench_random(c: &mut Criterion) {
    let mut group = c.benchmark_group("random");
    for workload in WORKLOADS {
        let sizes = sizes_for(*workload, 3);
        group.bench_function(workload.name, |b| {
            b.iter(|| {
                let mut alloc = SlabAllocator::new();
                let mut rng = StdRng::seed_from_u64(4);
                let mut live: Vec<NonNull<u8>> = Vec::new();
                for &size in &sizes {
                    let ptr = alloc.allocate(size, 0).unwrap();
                    live.push(ptr);
                    if live.len() > 1 && rng.gen_bool(0.3) {
                        let idx = rng.gen_range(0..live.len());
                        let victim = live.swap_remove(idx);
                        unsafe { alloc.deallocate(victim) };
                    }
                }
                for ptr in live {
                    unsafe { alloc.deallocate(ptr) };
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_simple, bench_shuffle, bench_random);
criterion_main!(benches);
