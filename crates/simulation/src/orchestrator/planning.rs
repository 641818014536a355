//! Response planning: turns converged assessment outputs into a
//! [`MitigationPlan`] and the evacuation demand the Response agent opens the
//! negotiation with.

use serde::{Deserialize, Serialize};

use crate::crisis_params::NegotiationParams;
use crate::infrastructure_graph::EvacuationRoute;
use crate::monte_carlo::MonteCarloResult;
use crate::negotiation::{EvacuationDemand, EvacuationPriority, ResourceInventory};
use crate::risk_model::RiskTier;
use crate::zones::ZoneBoard;

/// Minutes added on top of the slowest route for staging and loading.
pub const STAGING_MINUTES: f64 = 45.0;
/// Estimate used when no zone has a route to a shelter.
pub const NO_ROUTE_MINUTES: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationPlan {
    pub action: String,
    pub zones: Vec<String>,
    pub resources: Vec<String>,
    pub estimated_time_minutes: u32,
    /// In [0.5, 0.99].
    pub confidence: f64,
    pub routes: Vec<EvacuationRoute>,
}

/// Confidence from Monte Carlo spread when available, else a risk-tier
/// heuristic.
pub fn plan_confidence(monte_carlo: Option<&MonteCarloResult>, risk: f64) -> f64 {
    match monte_carlo {
        Some(mc) => (100.0 - 2.0 * mc.std_dev).clamp(50.0, 99.0) / 100.0,
        None => match RiskTier::from_score(risk) {
            RiskTier::Severe => 0.72,
            RiskTier::Elevated => 0.80,
            RiskTier::Low => 0.88,
        },
    }
}

pub fn estimated_minutes(routes: &[EvacuationRoute]) -> u32 {
    routes
        .iter()
        .filter_map(|r| r.route.as_ref())
        .map(|r| r.total_cost)
        .reduce(f64::max)
        .map_or(NO_ROUTE_MINUTES, |slowest| {
            (slowest + STAGING_MINUTES).round() as u32
        })
}

pub fn build_plan(
    zones: &[String],
    routes: Vec<EvacuationRoute>,
    inventory: &ResourceInventory,
    monte_carlo: Option<&MonteCarloResult>,
    risk: f64,
) -> MitigationPlan {
    let mut shelters: Vec<String> = routes
        .iter()
        .filter_map(|r| r.route.as_ref()?.destination().map(str::to_string))
        .collect();
    shelters.sort();
    shelters.dedup();

    let mut resources = vec![
        format!("{} pump units", inventory.pump_units),
        format!("{} evacuation vehicles", inventory.evacuation_vehicles),
        format!("{} medical teams", inventory.medical_teams),
    ];
    if !shelters.is_empty() {
        resources.push(format!("shelters {}", shelters.join(", ")));
    }

    MitigationPlan {
        action: format!(
            "Evacuate {} and deploy pump units to the river corridor",
            zones.join(", ")
        ),
        zones: zones.to_vec(),
        resources,
        estimated_time_minutes: estimated_minutes(&routes),
        confidence: plan_confidence(monte_carlo, risk),
        routes,
    }
}

/// Opening demand: every affected zone evacuated at once, full pump
/// allocation per zone.
pub fn initial_demand(
    zones: &[String],
    board: &ZoneBoard,
    params: &NegotiationParams,
) -> EvacuationDemand {
    EvacuationDemand {
        zones: zones.to_vec(),
        total_population: board.total_population(zones),
        priority: EvacuationPriority::Immediate,
        pumps_requested: params.pumps_per_zone * zones.len() as u32,
    }
}
