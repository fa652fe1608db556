//! Scheduler hot-path benchmarks, using the `BenchmarkId`/`benchmark_group`
//! shape of a gossip-scalability-style criterion suite.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::Path;

use efair_sched::config::SchedulerConfig;
use efair_sched::freq::MockGovernor;
use efair_sched::profile::{KernelProfile, Profile};
use efair_sched::scheduler::Scheduler;
use std::collections::BTreeMap;
use std::sync::Arc;

fn profile(power_mw: u64, freq: &str, kernels: usize) -> Profile {
    let mut gpu_power = BTreeMap::new();
    gpu_power.insert(freq.to_string(), power_mw);
    let mut names = Vec::new();
    let mut kernel_profile = BTreeMap::new();
    for i in 0..kernels {
        let name = format!("k{i}");
        let mut exec_time = BTreeMap::new();
        exec_time.insert(freq.to_string(), 50);
        kernel_profile.insert(name.clone(), KernelProfile { exec_time });
        names.push(name);
    }
    Profile {
        model_name: "bench".to_string(),
        exec_time: BTreeMap::new(),
        energy: BTreeMap::new(),
        gpu_power,
        kernels: names,
        kernel_profile,
    }
}

fn bench_slice_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice_allocation");

    for num_entities in [2usize, 16, 128] {
        group.throughput(Throughput::Elements(num_entities as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_entities),
            &num_entities,
            |b, &n| {
                let entries: Vec<_> = (0..n)
                    .map(|i| (i, 1024 - (i as u64 % 900), 500 + (i as u64 % 1500)))
                    .collect();
                b.iter(|| {
                    black_box(efair_sched::slice::compute_slices(&entries, 30_000, 0.5, 1_000));
                });
            },
        );
    }

    group.finish();
}

fn bench_task_submission(c: &mut Criterion) {
    c.bench_function("new_task_submission", |b| {
        let governor: Arc<dyn efair_sched::freq::Governor> =
            Arc::new(MockGovernor::new(vec!["1300500000".to_string()], 500));
        let sched = Scheduler::new(SchedulerConfig::default(), governor).unwrap();
        let eid = sched.create_entity(0).unwrap();
        let mid = sched
            .load_model(Path::new("m.so"), profile(500, "1300500000", 4), eid, "1300500000".to_string())
            .unwrap();

        b.iter(|| {
            black_box(sched.new_task(mid).unwrap());
        });
    });
}

fn bench_single_quantum_dispatch(c: &mut Criterion) {
    c.bench_function("single_entity_quantum", |b| {
        b.iter_batched(
            || {
                let governor: Arc<dyn efair_sched::freq::Governor> =
                    Arc::new(MockGovernor::new(vec!["1300500000".to_string()], 500));
                let sched =
                    Scheduler::new(SchedulerConfig::default(), governor).unwrap();
                let eid = sched.create_entity(0).unwrap();
                let mid = sched
                    .load_model(
                        Path::new("m.so"),
                        profile(500, "1300500000", 8),
                        eid,
                        "1300500000".to_string(),
                    )
                    .unwrap();
                let task = sched.new_task(mid).unwrap();
                (sched, task)
            },
            |(sched, task)| {
                sched.run().unwrap();
                sched.wait_task(task.id).unwrap();
                sched.shutdown().unwrap();
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_slice_allocation,
    bench_task_submission,
    bench_single_quantum_dispatch
);
criterion_main!(benches);
