//! Criterion benchmarks for the flood grid.
//!
//! Benchmarks:
//!   - one diffusion step under storm and nominal rainfall
//!   - the look-ahead forecast used by each simulation burst
//!
//! Run with: cargo bench -p simulation --bench flood_grid_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use simulation::crisis_params::CrisisParams;
use simulation::flood_grid::{build_flood_grid, predict_future, step_flood_grid, StepInput};
use simulation::telemetry::TelemetryPacket;

// ---------------------------------------------------------------------------
// Benchmark: single step
// ---------------------------------------------------------------------------

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("flood_grid_step");
    let params = CrisisParams::default();
    let grid = build_flood_grid(&params);

    for (name, packet) in [
        ("storm", TelemetryPacket::STORM),
        ("nominal", TelemetryPacket::NOMINAL),
    ] {
        let input = StepInput::from_telemetry(&packet, &params);
        group.bench_function(name, |b| {
            b.iter(|| black_box(step_flood_grid(black_box(&grid), &input, 1.0)));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: forecast
// ---------------------------------------------------------------------------

fn bench_forecast(c: &mut Criterion) {
    let params = CrisisParams::default();
    let grid = build_flood_grid(&params);
    let input = StepInput::from_telemetry(&TelemetryPacket::STORM, &params);

    c.bench_function("flood_grid_forecast", |b| {
        b.iter(|| {
            black_box(predict_future(
                black_box(&grid),
                &input,
                params.flood.flood_threshold,
                params.flood.forecast_steps,
            ))
        });
    });
}

criterion_group!(benches, bench_step, bench_forecast);
criterion_main!(benches);
