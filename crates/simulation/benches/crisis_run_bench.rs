//! Criterion benchmark: a whole crisis run through the Bevy schedule.
//!
//! Uses immediate pacing and inline assessments so every iteration measures
//! the orchestrator, the continuous loop and the ledger, not phase delays.
//!
//! Run with: cargo bench -p simulation --bench crisis_run_bench --features bench

use criterion::{criterion_group, criterion_main, Criterion};
use std::time::Duration;

use simulation::test_harness::TestCrisis;

fn bench_immediate_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("crisis_run");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(15));

    group.bench_function("inject_to_resolution", |b| {
        b.iter_with_setup(TestCrisis::immediate, |mut crisis| {
            crisis.inject();
            crisis.run_to_completion(200);
            crisis
        });
    });

    group.bench_function("idle_tick", |b| {
        let mut crisis = TestCrisis::immediate();
        b.iter(|| {
            crisis.tick(1);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_immediate_run);
criterion_main!(benches);
