//! Monte Carlo uncertainty estimation over the risk model.
//!
//! One burst draws `iterations` perturbed copies of the base telemetry from a
//! freshly reseeded [`SeededRng`], scores each with the deterministic risk
//! model and summarises the distribution. Identical inputs and seed give a
//! bit-identical [`MonteCarloResult`].

use serde::{Deserialize, Serialize};

use crate::crisis_params::{MonteCarloParams, RiskParams};
use crate::risk_model::calculate_live_risk_with;
use crate::sim_rng::SeededRng;
use crate::telemetry::TelemetryPacket;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRisk {
    pub zone: String,
    pub risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub mean: f64,
    pub std_dev: f64,
    pub ci95: [f64; 2],
    /// 99th percentile.
    pub worst_case: f64,
    pub scenarios_run: usize,
    pub zone_breakdown: Vec<ZoneRisk>,
}

/// Value at fraction `p` of an ascending sample.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Draw one perturbed packet, clamping each factor to its domain.
fn perturb(
    base: &TelemetryPacket,
    rng: &mut SeededRng,
    params: &MonteCarloParams,
) -> TelemetryPacket {
    let rain_sigma = base.rainfall * params.rainfall_sigma_fraction;
    let sigma = params.factor_sigma;
    TelemetryPacket {
        rainfall: rng.normal(base.rainfall, rain_sigma).max(0.0),
        drainage_capacity: rng.normal(base.drainage_capacity, sigma).clamp(0.0, 1.0),
        population_density: rng.normal(base.population_density, sigma).clamp(0.0, 1.0),
        social_spike: rng.normal(base.social_spike, sigma).clamp(0.0, 1.0),
    }
}

/// Run one burst with explicit risk weights and sampling parameters.
pub fn run_monte_carlo_with(
    base: &TelemetryPacket,
    iterations: usize,
    seed: u32,
    params: &MonteCarloParams,
    risk: &RiskParams,
) -> MonteCarloResult {
    let mut rng = SeededRng::new(seed);

    let coefficients = &params.zone_coefficients;
    let mut samples = Vec::with_capacity(iterations);
    let mut zone_sums = vec![0.0_f64; coefficients.len()];

    for _ in 0..iterations {
        let sample = perturb(base, &mut rng, params);
        let score = f64::from(calculate_live_risk_with(&sample, risk));
        for (sum, zc) in zone_sums.iter_mut().zip(coefficients) {
            *sum += (score * zc.coefficient).min(100.0);
        }
        samples.push(score);
    }

    let n = samples.len().max(1) as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    samples.sort_by(f64::total_cmp);

    MonteCarloResult {
        mean,
        std_dev: variance.sqrt(),
        ci95: [percentile(&samples, 0.025), percentile(&samples, 0.975)],
        worst_case: percentile(&samples, 0.99),
        scenarios_run: iterations,
        zone_breakdown: coefficients
            .iter()
            .zip(zone_sums)
            .map(|(zc, sum)| ZoneRisk {
                zone: zc.zone.clone(),
                risk: sum / n,
            })
            .collect(),
    }
}

/// Run one burst with the reference weights and zone table.
pub fn run_monte_carlo(base: &TelemetryPacket, iterations: usize, seed: u32) -> MonteCarloResult {
    run_monte_carlo_with(
        base,
        iterations,
        seed,
        &MonteCarloParams::default(),
        &RiskParams::default(),
    )
}
