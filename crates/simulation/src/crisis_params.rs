//! Data-driven crisis parameters.
//!
//! Collects every tunable constant of the engine into a single
//! [`CrisisParams`] resource so a scenario can be reconfigured without
//! recompilation. Every section is `#[serde(default)]`, so a partial JSON
//! file only overrides the fields it names.
//!
//! Several of these values are demo constants rather than modelled facts
//! (the Monte Carlo zone coefficients, the altitude noise, the people per
//! vehicle). They live here so they can be overridden.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::CrisisError;

// ---------------------------------------------------------------------------
// Risk model
// ---------------------------------------------------------------------------

/// Weights and normalisation for the deterministic risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParams {
    /// Rainfall (mm) that saturates the rainfall term.
    pub rainfall_cap_mm: f64,
    pub rainfall_weight: f64,
    pub drainage_weight: f64,
    pub population_weight: f64,
    pub social_weight: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            rainfall_cap_mm: 150.0,
            rainfall_weight: 0.4,
            drainage_weight: 0.2,
            population_weight: 0.2,
            social_weight: 0.2,
        }
    }
}

// ---------------------------------------------------------------------------
// Bayesian engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesParams {
    /// Prior flood probability at the start of each run.
    pub prior: f64,
    /// Long-run flood frequency fed in as `historical_frequency` evidence.
    pub historical_frequency: f64,
    /// Gauge reading (m) treated as a sensor alert when the river is high.
    pub river_base_level_m: f64,
    /// Extra river level (m) per mm of rainfall.
    pub river_rise_per_mm: f64,
}

impl Default for BayesParams {
    fn default() -> Self {
        Self {
            prior: 0.3,
            historical_frequency: 0.35,
            river_base_level_m: 2.0,
            river_rise_per_mm: 0.04,
        }
    }
}

// ---------------------------------------------------------------------------
// Monte Carlo
// ---------------------------------------------------------------------------

/// One row of the per-zone exposure table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCoefficient {
    pub zone: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloParams {
    pub iterations: usize,
    pub seed: u32,
    /// Rainfall standard deviation as a fraction of the base rainfall.
    pub rainfall_sigma_fraction: f64,
    /// Standard deviation for drainage, population and social factors.
    pub factor_sigma: f64,
    /// Relative exposure of named zones to the overall risk.
    pub zone_coefficients: Vec<ZoneCoefficient>,
}

impl Default for MonteCarloParams {
    fn default() -> Self {
        Self {
            iterations: 2000,
            seed: 1337,
            rainfall_sigma_fraction: 0.15,
            factor_sigma: 0.05,
            zone_coefficients: vec![
                ZoneCoefficient {
                    zone: "zone-1".to_string(),
                    coefficient: 1.1,
                },
                ZoneCoefficient {
                    zone: "zone-2".to_string(),
                    coefficient: 0.95,
                },
                ZoneCoefficient {
                    zone: "zone-3".to_string(),
                    coefficient: 0.85,
                },
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Flood grid
// ---------------------------------------------------------------------------

/// Which deterministic noise function perturbs the valley heightmap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AltitudeNoise {
    /// Sum of sines and cosines of the cell coordinates.
    Trigonometric { amplitude: f32 },
    /// OpenSimplex2 noise with a fixed seed.
    Simplex {
        seed: i32,
        frequency: f32,
        amplitude: f32,
    },
    /// Pure valley profile.
    None,
}

impl Default for AltitudeNoise {
    fn default() -> Self {
        AltitudeNoise::Trigonometric { amplitude: 6.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodParams {
    pub rows: usize,
    pub cols: usize,
    /// Radius (cells) around a zone centre that belongs to the zone.
    pub zone_radius: f32,
    pub altitude_noise: AltitudeNoise,
    /// Multiplier on every cell's natural drainage.
    pub global_drainage_modifier: f32,
    /// Water level above which a cell counts as flooded.
    pub flood_threshold: f32,
    /// Steps applied to the grid during one simulation burst.
    pub burst_steps: u32,
    /// Look-ahead used for the flood forecast.
    pub forecast_steps: u32,
}

impl Default for FloodParams {
    fn default() -> Self {
        Self {
            rows: crate::config::FLOOD_GRID_ROWS,
            cols: crate::config::FLOOD_GRID_COLS,
            zone_radius: 2.5,
            altitude_noise: AltitudeNoise::default(),
            global_drainage_modifier: 0.05,
            flood_threshold: 0.4,
            burst_steps: 10,
            forecast_steps: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// Infrastructure graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphParams {
    /// Minutes added per unit of target water level.
    pub flood_penalty: f64,
    pub node_flood_threshold: f64,
    pub bridge_failure_level: f64,
    pub edge_failure_level: f64,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            flood_penalty: 20.0,
            node_flood_threshold: 0.4,
            bridge_failure_level: 0.5,
            edge_failure_level: 0.7,
        }
    }
}

// ---------------------------------------------------------------------------
// Negotiation and inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationParams {
    pub max_rounds: u32,
    pub people_per_vehicle: u32,
    /// Pumps the Response agent asks for per evacuated zone.
    pub pumps_per_zone: u32,
    /// Zones named in the initial demand.
    pub demand_zone_count: usize,
}

impl Default for NegotiationParams {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            people_per_vehicle: 55,
            pumps_per_zone: 4,
            demand_zone_count: 3,
        }
    }
}

/// Static inventory the Resource agent audits at the start of each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryParams {
    pub pump_units: u32,
    pub evacuation_vehicles: u32,
    pub max_simultaneous_zones: u32,
    pub shelter_capacity: u32,
    pub medical_teams: u32,
}

impl Default for InventoryParams {
    fn default() -> Self {
        Self {
            pump_units: 8,
            evacuation_vehicles: 40,
            max_simultaneous_zones: 3,
            shelter_capacity: 12_000,
            medical_teams: 6,
        }
    }
}

// ---------------------------------------------------------------------------
// Governance, pacing and the continuous loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceParams {
    pub human_in_the_loop: bool,
    /// Ticks to wait for a human approval (one tick is one simulated second).
    pub approval_timeout_ticks: u64,
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            human_in_the_loop: false,
            approval_timeout_ticks: 24 * 60 * 60,
        }
    }
}

/// Cosmetic pacing. All zero-delay values are valid and make a run complete
/// as fast as the schedule allows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingParams {
    /// Ticks between two orchestrator phases.
    pub phase_delay_ticks: u64,
    /// Deployment steps narrated during execution.
    pub execution_steps: u32,
    /// Ticks between two deployment steps.
    pub execution_interval_ticks: u64,
    /// Risk points the displayed gauge moves per tick.
    pub gauge_step: f64,
}

impl Default for PacingParams {
    fn default() -> Self {
        Self {
            phase_delay_ticks: 2,
            execution_steps: 5,
            execution_interval_ticks: 6,
            gauge_step: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousParams {
    pub enabled: bool,
    pub interval_ticks: u64,
    /// Risk jump (points) between two loop samples that interrupts mitigation.
    pub escalation_threshold: f64,
}

impl Default for ContinuousParams {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ticks: 5,
            escalation_threshold: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryParams {
    /// Whether the built-in synthetic source emits packets.
    pub synthetic: bool,
    pub emit_interval_ticks: u64,
    /// Ticks without a packet before a gap is reported.
    pub stale_after_ticks: u64,
    pub seed: u32,
    /// Relative jitter applied to synthetic packets.
    pub jitter: f64,
}

impl Default for TelemetryParams {
    fn default() -> Self {
        Self {
            synthetic: true,
            emit_interval_ticks: 3,
            stale_after_ticks: 30,
            seed: 7,
            jitter: 0.03,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionParams {
    /// Spawn the assessment procedures on the async task pool rather than
    /// running them inline on the schedule thread.
    pub parallel_assessment: bool,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            parallel_assessment: true,
        }
    }
}

// ---------------------------------------------------------------------------
// CrisisParams resource
// ---------------------------------------------------------------------------

/// All crisis engine tunables.
#[derive(Resource, Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrisisParams {
    pub risk: RiskParams,
    pub bayes: BayesParams,
    pub monte_carlo: MonteCarloParams,
    pub flood: FloodParams,
    pub graph: GraphParams,
    pub negotiation: NegotiationParams,
    pub inventory: InventoryParams,
    pub governance: GovernanceParams,
    pub pacing: PacingParams,
    pub continuous: ContinuousParams,
    pub telemetry: TelemetryParams,
    pub execution: ExecutionParams,
}

impl CrisisParams {
    /// Parse a (possibly partial) JSON override.
    pub fn from_json(text: &str) -> Result<Self, CrisisError> {
        serde_json::from_str(text).map_err(|e| CrisisError::Config(e.to_string()))
    }

    /// Zero pacing, inline assessment and no synthetic telemetry jitter
    /// surprises: the configuration tests and benchmarks run with.
    pub fn immediate() -> Self {
        let mut params = Self::default();
        params.pacing.phase_delay_ticks = 0;
        params.pacing.execution_interval_ticks = 1;
        params.execution.parallel_assessment = false;
        params
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
