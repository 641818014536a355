//! Sequential Bayesian flood-probability estimator.
//!
//! Each [`BayesianEngine::update`] maps one piece of evidence to a likelihood,
//! applies Bayes' rule against the current prior and narrows the confidence
//! interval. The posterior becomes the prior of the next update.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CrisisError;

/// Posterior clamp; the engine never reports certainty.
pub const POSTERIOR_MIN: f64 = 0.01;
pub const POSTERIOR_MAX: f64 = 0.99;
/// Narrowest confidence half-width.
pub const CI_FLOOR: f64 = 0.03;
/// Confidence half-width before any evidence.
pub const CI_INITIAL: f64 = 0.25;
/// Floor of P(evidence | no flood).
pub const COMPLEMENT_FLOOR: f64 = 0.05;

/// Evidence kinds with a likelihood function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Rainfall,
    DrainageFailure,
    SocialSpike,
    SensorAlert,
    RiverLevel,
    HistoricalFrequency,
}

impl EvidenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceType::Rainfall => "rainfall",
            EvidenceType::DrainageFailure => "drainage_failure",
            EvidenceType::SocialSpike => "social_spike",
            EvidenceType::SensorAlert => "sensor_alert",
            EvidenceType::RiverLevel => "river_level",
            EvidenceType::HistoricalFrequency => "historical_frequency",
        }
    }

    /// P(evidence | flood) for an observed value.
    pub fn likelihood(self, value: f64) -> f64 {
        let l = match self {
            // logistic, midpoint 60 mm
            EvidenceType::Rainfall => logistic(value, 60.0, 15.0),
            // `value` is the remaining drainage capacity
            EvidenceType::DrainageFailure => 1.0 - value,
            EvidenceType::SocialSpike => 0.85 * value,
            EvidenceType::SensorAlert => (0.9 * value).min(1.0),
            // logistic, midpoint 5 m
            EvidenceType::RiverLevel => logistic(value, 5.0, 0.75),
            EvidenceType::HistoricalFrequency => value.min(1.0),
        };
        l.clamp(0.0, 1.0)
    }
}

impl FromStr for EvidenceType {
    type Err = CrisisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rainfall" => Ok(EvidenceType::Rainfall),
            "drainage_failure" => Ok(EvidenceType::DrainageFailure),
            "social_spike" => Ok(EvidenceType::SocialSpike),
            "sensor_alert" => Ok(EvidenceType::SensorAlert),
            "river_level" => Ok(EvidenceType::RiverLevel),
            "historical_frequency" => Ok(EvidenceType::HistoricalFrequency),
            other => Err(CrisisError::UnknownEvidenceType(other.to_string())),
        }
    }
}

fn logistic(x: f64, midpoint: f64, scale: f64) -> f64 {
    1.0 / (1.0 + (-(x - midpoint) / scale).exp())
}

/// One applied update. Never modified after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianUpdate {
    pub evidence_type: EvidenceType,
    pub value: f64,
    pub prior: f64,
    pub likelihood: f64,
    pub posterior: f64,
}

/// Snapshot of the estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianState {
    pub prior: f64,
    pub posterior: f64,
    pub likelihood: f64,
    /// |posterior - prior| of the last update.
    pub evidence_strength: f64,
    pub confidence_interval: [f64; 2],
    pub update_count: u32,
    pub history: Vec<BayesianUpdate>,
}

/// Sequential estimator; reset to a fresh prior at the start of each run.
#[derive(Debug, Clone)]
pub struct BayesianEngine {
    state: BayesianState,
}

impl Default for BayesianEngine {
    fn default() -> Self {
        Self::new(0.3)
    }
}

impl BayesianEngine {
    pub fn new(prior: f64) -> Self {
        let prior = prior.clamp(POSTERIOR_MIN, POSTERIOR_MAX);
        Self {
            state: BayesianState {
                prior,
                posterior: prior,
                likelihood: 0.0,
                evidence_strength: 0.0,
                confidence_interval: interval(prior, CI_INITIAL),
                update_count: 0,
                history: Vec::new(),
            },
        }
    }

    pub fn state(&self) -> &BayesianState {
        &self.state
    }

    pub fn posterior(&self) -> f64 {
        self.state.posterior
    }

    pub fn history(&self) -> &[BayesianUpdate] {
        &self.state.history
    }

    /// Apply evidence named by string; unknown names fail without touching
    /// the state.
    pub fn update(
        &mut self,
        evidence_type: &str,
        value: f64,
    ) -> Result<&BayesianState, CrisisError> {
        let kind = EvidenceType::from_str(evidence_type)?;
        Ok(self.apply(kind, value))
    }

    pub fn apply(&mut self, kind: EvidenceType, value: f64) -> &BayesianState {
        let prior = self.state.posterior;
        let likelihood = kind.likelihood(value);
        let complement = (1.0 - likelihood * 0.8).max(COMPLEMENT_FLOOR);
        let evidence = likelihood * prior + complement * (1.0 - prior);
        let raw = if evidence > 0.0 {
            likelihood * prior / evidence
        } else {
            prior
        };
        let posterior = raw.clamp(POSTERIOR_MIN, POSTERIOR_MAX);

        let s = &mut self.state;
        s.update_count += 1;
        s.prior = prior;
        s.posterior = posterior;
        s.likelihood = likelihood;
        s.evidence_strength = (posterior - prior).abs();
        let half_width = (CI_INITIAL / f64::from(s.update_count + 1).sqrt()).max(CI_FLOOR);
        s.confidence_interval = interval(posterior, half_width);
        s.history.push(BayesianUpdate {
            evidence_type: kind,
            value,
            prior,
            likelihood,
            posterior,
        });
        &self.state
    }

    /// Discard all history and counters.
    pub fn reset(&mut self, prior: f64) {
        *self = Self::new(prior);
    }
}

fn interval(center: f64, half_width: f64) -> [f64; 2] {
    [(center - half_width).max(0.0), (center + half_width).min(1.0)]
}
