//! Criterion benchmarks for the random walk sampler and batch execution.
//!
//! Sampler cost scales with the horizon (one normal draw per day); batch
//! throughput is measured inline and on the worker pool.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pricer_forecast::batch::BatchPlan;
use pricer_forecast::pool::{simulate_batch, BatchJob, BatchWorkerPool};
use pricer_forecast::rng::{derive_seed, WalkRng};
use pricer_forecast::sampler::RandomWalk;

fn bench_sampler_horizon(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler_horizon");

    for days in [30u32, 365, 1825] {
        let walk = RandomWalk::new(50_000.0, 0.2, days);
        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::from_parameter(days), &walk, |b, walk| {
            let mut rng = WalkRng::from_seed(42);
            b.iter(|| walk.sample(black_box(&mut rng)));
        });
    }

    group.finish();
}

fn bench_batch_inline(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_inline");
    group.sample_size(20);

    for size in [1_000usize, 5_000] {
        let job = BatchJob {
            sequence: 0,
            size,
            walk: RandomWalk::new(50_000.0, 0.2, 365),
            seed: 7,
        };
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &job, |b, job| {
            b.iter(|| simulate_batch(black_box(job)));
        });
    }

    group.finish();
}

fn bench_pool_run(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("pool_run_10k");
    group.sample_size(10);

    let plan = BatchPlan::partition(10_000, 2_500);
    let walk = RandomWalk::new(50_000.0, 0.2, 365);

    for workers in [1usize, 2, 4] {
        let pool = BatchWorkerPool::new(workers).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(workers), &pool, |b, pool| {
            b.iter(|| {
                runtime.block_on(async {
                    let mut handles = Vec::with_capacity(plan.len());
                    for (sequence, &size) in plan.sizes().iter().enumerate() {
                        let pool = pool.clone();
                        let job = BatchJob {
                            sequence,
                            size,
                            walk,
                            seed: derive_seed(1, sequence as u64),
                        };
                        handles.push(tokio::spawn(async move { pool.run(job).await }));
                    }
                    for handle in handles {
                        black_box(handle.await.unwrap().unwrap());
                    }
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sampler_horizon, bench_batch_inline, bench_pool_run);
criterion_main!(benches);
