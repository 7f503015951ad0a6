//! Contention Scaling Benchmarks
//!
//! Runs writers and readers on separate threads and measures how throughput
//! changes with capacity, worker count and wait channel granularity.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use seqring::ring::{RingBuffer, WaitGranularity};

// Capacity configurations to test
const CAPACITIES: [usize; 4] = [4, 64, 1024, 8192];
const WORKER_COUNTS: [usize; 3] = [1, 2, 4];
const OPERATIONS_PER_WORKER: u64 = 10_000;

/// Run `workers` writers and `workers` readers to completion
fn run_mpmc(capacity: usize, workers: usize, granularity: WaitGranularity) {
    let ring = Arc::new(
        RingBuffer::builder()
            .capacity(capacity)
            .granularity(granularity)
            .parallelism(4)
            .build()
            .expect("Failed to create ring buffer"),
    );

    let mut handles = Vec::with_capacity(workers * 2);
    for id in 0..workers {
        let writer = Arc::clone(&ring);
        handles.push(thread::spawn(move || {
            for _ in 0..OPERATIONS_PER_WORKER {
                let sequence = writer.reserve_write(id);
                writer.commit_write(id, sequence).unwrap();
            }
        }));

        let reader = Arc::clone(&ring);
        handles.push(thread::spawn(move || {
            for _ in 0..OPERATIONS_PER_WORKER {
                let sequence = reader.reserve_read(id);
                reader.commit_read(id, sequence).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().expect("worker panicked");
    }
}

fn capacity_scaling_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("capacity_scaling");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for capacity in CAPACITIES {
        group.throughput(Throughput::Elements(2 * OPERATIONS_PER_WORKER));
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| run_mpmc(capacity, 2, WaitGranularity::FineGrained));
            },
        );
    }

    group.finish();
}

fn worker_scaling_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_scaling");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for granularity in [WaitGranularity::Coarse, WaitGranularity::FineGrained] {
        for workers in WORKER_COUNTS {
            group.throughput(Throughput::Elements(workers as u64 * OPERATIONS_PER_WORKER));
            group.bench_with_input(
                BenchmarkId::new(format!("{granularity:?}"), workers),
                &workers,
                |b, &workers| {
                    b.iter(|| run_mpmc(64, workers, granularity));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    capacity_scaling_benchmark,
    worker_scaling_benchmark
);
criterion_main!(benches);
