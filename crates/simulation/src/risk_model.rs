//! Deterministic risk model.
//!
//! Pure functions from a [`TelemetryPacket`] to a 0-100 risk score, the
//! per-factor sensitivity breakdown, and the non-linear inference estimate
//! the risk agent reports as a cross-check.

use serde::{Deserialize, Serialize};

use crate::crisis_params::RiskParams;
use crate::telemetry::TelemetryPacket;

/// Each factor's share of the weighted risk, in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensitivityBreakdown {
    pub rainfall: u32,
    pub drainage: u32,
    pub population: u32,
    pub social: u32,
}

impl SensitivityBreakdown {
    pub fn total(&self) -> u32 {
        self.rainfall + self.drainage + self.population + self.social
    }
}

fn weighted_terms(t: &TelemetryPacket, p: &RiskParams) -> [f64; 4] {
    let rainfall_norm = (t.rainfall / p.rainfall_cap_mm).clamp(0.0, 1.0);
    let drainage_inverse = 1.0 - t.drainage_capacity;
    [
        p.rainfall_weight * rainfall_norm,
        p.drainage_weight * drainage_inverse,
        p.population_weight * t.population_density,
        p.social_weight * t.social_spike,
    ]
}

/// Risk score in [0, 100] using the given weights.
pub fn calculate_live_risk_with(t: &TelemetryPacket, p: &RiskParams) -> u32 {
    let sum: f64 = weighted_terms(t, p).iter().sum();
    (sum * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Risk score in [0, 100] with the reference weights.
pub fn calculate_live_risk(t: &TelemetryPacket) -> u32 {
    calculate_live_risk_with(t, &RiskParams::default())
}

pub fn compute_sensitivity_with(t: &TelemetryPacket, p: &RiskParams) -> SensitivityBreakdown {
    let terms = weighted_terms(t, p);
    let sum: f64 = terms.iter().sum();
    if sum <= f64::EPSILON {
        return SensitivityBreakdown::default();
    }
    let pct = |v: f64| ((v / sum) * 100.0).round().max(0.0) as u32;
    SensitivityBreakdown {
        rainfall: pct(terms[0]),
        drainage: pct(terms[1]),
        population: pct(terms[2]),
        social: pct(terms[3]),
    }
}

/// Percentage contribution of each factor; all zero for safe telemetry.
pub fn compute_sensitivity(t: &TelemetryPacket) -> SensitivityBreakdown {
    compute_sensitivity_with(t, &RiskParams::default())
}

/// Coarse band used by the response planner and zone status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Elevated,
    Severe,
}

impl RiskTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            RiskTier::Severe
        } else if score >= 50.0 {
            RiskTier::Elevated
        } else {
            RiskTier::Low
        }
    }
}

// =============================================================================
// Inference estimate
// =============================================================================

pub const INFERENCE_MODEL_NAME: &str = "geo-social-v1";

/// Point estimate with a symmetric uncertainty band, all in risk points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub predicted_risk: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
    pub model_used: String,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Non-linear risk estimate: rainfall dominates super-linearly, drainage
/// failure adds a geophysical term, social and population signals add less.
pub fn infer_risk(t: &TelemetryPacket) -> InferenceResult {
    infer_risk_with(t, &RiskParams::default())
}

pub fn infer_risk_with(t: &TelemetryPacket, p: &RiskParams) -> InferenceResult {
    let rain_norm = (t.rainfall / p.rainfall_cap_mm).min(1.0);
    let drainage_fail = 1.0 - t.drainage_capacity;
    let geo = rain_norm.powf(1.3) * 0.5 + drainage_fail * 0.25;
    let base = geo + t.social_spike * 0.15 + t.population_density * 0.10;
    let predicted = (base * 100.0).clamp(0.0, 100.0);
    let variance = (predicted * 0.08).max(3.0);
    InferenceResult {
        predicted_risk: round1(predicted),
        confidence_low: round1((predicted - variance).max(0.0)),
        confidence_high: round1((predicted + variance).min(100.0)),
        model_used: INFERENCE_MODEL_NAME.to_string(),
    }
}
