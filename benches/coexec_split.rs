//! Benchmarks for full co-execution iterations across host fractions

use coexec::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const TASKS: usize = 20_000;

fn work(i: usize) -> u64 {
    (0..64u64).fold(i as u64, |acc, j| acc.wrapping_mul(6364136223846793005).wrapping_add(j))
}

fn bench_static_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("static_split");

    for alpha in [0.0, 0.25, 0.5, 0.75, 1.0] {
        let config = Config::builder()
            .alpha(alpha)
            .num_threads(4)
            .work_groups(4)
            .build()
            .unwrap();
        let device = SimulatedAccelerator::new(infallible(work), 4);
        let mut exec: CoExecutor<u64, _> = CoExecutor::new(config, TASKS, device).unwrap();
        let kernel = infallible(work);

        group.bench_with_input(BenchmarkId::from_parameter(alpha), &alpha, |b, _| {
            b.iter(|| black_box(exec.run_iteration(&kernel).unwrap().device_tasks()));
        });
    }
    group.finish();
}

fn bench_dynamic(c: &mut Criterion) {
    let config = Config::builder()
        .dynamic()
        .unified_memory(true)
        .num_threads(4)
        .work_groups(4)
        .build()
        .unwrap();
    let device = SimulatedAccelerator::new(infallible(work), 4);
    let mut exec: CoExecutor<u64, _> = CoExecutor::new(config, TASKS, device).unwrap();
    let kernel = infallible(work);

    c.bench_function("dynamic_unified", |b| {
        b.iter(|| black_box(exec.run_iteration(&kernel).unwrap().host_tasks()));
    });
}

fn bench_merge(c: &mut Criterion) {
    c.bench_function("merge_half", |b| {
        b.iter(|| {
            let mut host = ResultBuffer::new(TASKS);
            let mut device = ResultBuffer::new(TASKS);
            for i in 0..TASKS / 2 {
                host.write(i, i as u64).unwrap();
            }
            for i in TASKS / 2..TASKS {
                device.write(i, i as u64).unwrap();
            }
            merge_partitioned(&mut host, &mut device, TASKS / 2..TASKS).unwrap()
        });
    });
}

criterion_group!(benches, bench_static_split, bench_dynamic, bench_merge);
criterion_main!(benches);
