//! Criterion benchmarks for Monte Carlo risk sampling.
//!
//! Benchmarks:
//!   - 1K, 10K and 50K scenarios around storm telemetry
//!
//! Run with: cargo bench -p simulation --bench monte_carlo_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use simulation::crisis_params::CrisisParams;
use simulation::monte_carlo::run_monte_carlo_with;
use simulation::telemetry::TelemetryPacket;

fn bench_scenarios(c: &mut Criterion) {
    let mut group = c.benchmark_group("monte_carlo");
    let params = CrisisParams::default();

    for iterations in [1_000usize, 10_000, 50_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &iterations,
            |b, &n| {
                b.iter(|| {
                    black_box(run_monte_carlo_with(
                        black_box(&TelemetryPacket::STORM),
                        n,
                        params.monte_carlo.seed,
                        &params.monte_carlo,
                        &params.risk,
                    ))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_scenarios);
criterion_main!(benches);
