//! Stress tests for dynamic claiming and repeated co-execution

use coexec::prelude::*;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::thread;

fn claim_all(p: &Partitioner, worklist: &Worklist, threads: usize, jitter: bool) -> Vec<usize> {
    let claimed = Arc::new(Mutex::new(Vec::new()));
    thread::scope(|s| {
        for t in 0..threads {
            let claimed = claimed.clone();
            s.spawn(move || {
                let mut rng = rand::thread_rng();
                let lane = if t == 0 { Lane::Device(0) } else { Lane::Host(t) };
                let mut local = Vec::new();
                let mut task = p.first(lane, worklist);
                while p.has_more(lane, task) {
                    local.push(task);
                    if jitter && rng.gen_bool(0.1) {
                        thread::yield_now();
                    }
                    task = p.next(task, threads, worklist);
                }
                claimed.lock().extend(local);
            });
        }
    });
    let mut claimed = Arc::try_unwrap(claimed).unwrap().into_inner();
    claimed.sort_unstable();
    claimed
}

#[test]
fn stress_thousand_claims_eight_threads() {
    let p = Partitioner::new(1000, -1.0);
    let worklist = Worklist::new();
    let claimed = claim_all(&p, &worklist, 8, false);
    assert_eq!(claimed, (0..1000).collect::<Vec<_>>());
}

#[test]
fn stress_claims_with_random_yields() {
    let p = Partitioner::new(1000, 2.0);
    let worklist = Worklist::new();
    for _ in 0..50 {
        worklist.reset();
        let claimed = claim_all(&p, &worklist, 8, true);
        assert_eq!(claimed, (0..1000).collect::<Vec<_>>());
    }
}

#[test]
fn stress_repeated_iterations_are_identical() {
    let config = Config::builder()
        .alpha(0.37)
        .num_threads(8)
        .work_groups(4)
        .build()
        .unwrap();
    let device = SimulatedAccelerator::new(infallible(|i| (i, false)), 4);
    let mut exec: CoExecutor<(usize, bool), _> = CoExecutor::new(config, 777, device).unwrap();

    let first = exec.run_iteration(&infallible(|i| (i, true))).unwrap();
    let baseline = exec.results().to_vec().unwrap();
    for _ in 0..20 {
        let report = exec.run_iteration(&infallible(|i| (i, true))).unwrap();
        assert_eq!(report.host_tasks(), first.host_tasks());
        assert_eq!(report.host.per_worker, first.host.per_worker);
        assert_eq!(exec.results().to_vec().unwrap(), baseline);
    }
}

#[test]
#[ignore] // Run with --ignored flag
fn stress_dynamic_many_iterations() {
    let config = Config::builder()
        .dynamic()
        .unified_memory(true)
        .num_threads(8)
        .work_groups(8)
        .warmup(10)
        .reps(500)
        .build()
        .unwrap();
    let device = SimulatedAccelerator::new(infallible(|i: usize| i.wrapping_mul(31)), 8);
    let mut exec: CoExecutor<usize, _> = CoExecutor::new(config, 10_000, device).unwrap();

    let report = exec
        .run_and_verify(
            &infallible(|i: usize| i.wrapping_mul(31)),
            &|r: &ResultBuffer<usize>| -> std::result::Result<(), String> {
                match r.iter().enumerate().find(|(i, v)| *v != Some(&i.wrapping_mul(31))) {
                    Some((i, _)) => Err(format!("slot {} wrong", i)),
                    None => Ok(()),
                }
            },
        )
        .unwrap();
    assert_eq!(report.iterations, 510);
}
