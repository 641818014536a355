//! Bounded-round negotiation between the Response and Resource agents.
//!
//! Response proposes an [`EvacuationDemand`]; Resource checks it against the
//! fixed [`ResourceInventory`]. An infeasible proposal comes back with a
//! suggested fix that Response applies before the next round. Running out of
//! rounds is not an error: the last proposal is returned marked timed out.

use serde::{Deserialize, Serialize};

use crate::crisis_params::{InventoryParams, NegotiationParams};

/// Static per-run inventory. Audited, never mutated by negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInventory {
    pub pump_units: u32,
    pub evacuation_vehicles: u32,
    pub max_simultaneous_zones: u32,
    pub shelter_capacity: u32,
    pub medical_teams: u32,
}

impl Default for ResourceInventory {
    fn default() -> Self {
        Self::from(&InventoryParams::default())
    }
}

impl From<&InventoryParams> for ResourceInventory {
    fn from(p: &InventoryParams) -> Self {
        Self {
            pump_units: p.pump_units,
            evacuation_vehicles: p.evacuation_vehicles,
            max_simultaneous_zones: p.max_simultaneous_zones,
            shelter_capacity: p.shelter_capacity,
            medical_teams: p.medical_teams,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvacuationPriority {
    Immediate,
    Staggered,
}

/// What the Response agent asks for. Adjusted between rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvacuationDemand {
    pub zones: Vec<String>,
    pub total_population: u32,
    pub priority: EvacuationPriority,
    pub pumps_requested: u32,
}

/// Adjustment the Resource agent proposes for an infeasible demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedFix {
    pub priority: Option<EvacuationPriority>,
    pub pumps_requested: Option<u32>,
}

impl SuggestedFix {
    pub fn apply(&self, demand: &EvacuationDemand) -> EvacuationDemand {
        let mut next = demand.clone();
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(pumps) = self.pumps_requested {
            next.pumps_requested = pumps;
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasibilityCheck {
    pub feasible: bool,
    /// Combined human-readable reason; empty when feasible.
    pub reason: String,
    /// Population exceeds shelter capacity. Reported only.
    pub shelter_overflow: bool,
    /// `None` when no local adjustment can help.
    pub suggested_fix: Option<SuggestedFix>,
}

/// Evaluate the four constraints. Only zone count, pumps and immediate
/// vehicle capacity decide feasibility; shelter capacity is reported.
pub fn check_feasibility(
    demand: &EvacuationDemand,
    inventory: &ResourceInventory,
    people_per_vehicle: u32,
) -> FeasibilityCheck {
    let mut reasons = Vec::new();
    let mut fix_priority = None;
    let mut fix_pumps = None;

    let zone_count = demand.zones.len() as u32;
    if zone_count > inventory.max_simultaneous_zones {
        reasons.push(format!(
            "{} zones exceed the limit of {} simultaneous zones",
            zone_count, inventory.max_simultaneous_zones
        ));
    }
    if demand.pumps_requested > inventory.pump_units {
        reasons.push(format!(
            "{} pumps requested but only {} available",
            demand.pumps_requested, inventory.pump_units
        ));
        fix_pumps = Some(inventory.pump_units);
    }
    let vehicle_capacity = inventory.evacuation_vehicles.saturating_mul(people_per_vehicle);
    if demand.priority == EvacuationPriority::Immediate
        && demand.total_population > vehicle_capacity
    {
        reasons.push(format!(
            "immediate evacuation of {} people exceeds vehicle capacity of {}",
            demand.total_population, vehicle_capacity
        ));
        fix_priority = Some(EvacuationPriority::Staggered);
    }

    let shelter_overflow = demand.total_population > inventory.shelter_capacity;
    let feasible = reasons.is_empty();
    let suggested_fix = if fix_priority.is_some() || fix_pumps.is_some() {
        Some(SuggestedFix {
            priority: fix_priority,
            pumps_requested: fix_pumps,
        })
    } else {
        None
    };

    FeasibilityCheck {
        feasible,
        reason: reasons.join("; "),
        shelter_overflow,
        suggested_fix,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationOutcome {
    Consensus,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub round: u32,
    pub demand: EvacuationDemand,
    pub check: FeasibilityCheck,
}

/// One line of the negotiation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub round: u32,
    pub speaker: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationResult {
    pub outcome: NegotiationOutcome,
    pub accepted_demand: EvacuationDemand,
    pub rounds: u32,
    pub proposals: Vec<Proposal>,
    pub transcript: Vec<TranscriptEntry>,
}

impl NegotiationResult {
    pub fn is_consensus(&self) -> bool {
        self.outcome == NegotiationOutcome::Consensus
    }
}

impl EvacuationDemand {
    /// One-line summary used in transcripts and logs.
    pub fn describe(&self) -> String {
        let priority = match self.priority {
            EvacuationPriority::Immediate => "immediate",
            EvacuationPriority::Staggered => "staggered",
        };
        format!(
            "{} evacuation of {} ({} people), {} pumps",
            priority,
            self.zones.join(", "),
            self.total_population,
            self.pumps_requested
        )
    }
}

/// Negotiate `initial` against `inventory` for at most `max_rounds` rounds.
pub fn run_dynamic_negotiation(
    initial: EvacuationDemand,
    inventory: &ResourceInventory,
    params: &NegotiationParams,
) -> NegotiationResult {
    let max_rounds = params.max_rounds.max(1);
    let mut demand = initial;
    let mut proposals = Vec::new();
    let mut transcript = Vec::new();

    for round in 1..=max_rounds {
        transcript.push(TranscriptEntry {
            round,
            speaker: "Response".into(),
            message: format!("Proposal: {}", demand.describe()),
        });
        let check = check_feasibility(&demand, inventory, params.people_per_vehicle);
        let feasible = check.feasible;
        let fix = check.suggested_fix.clone();

        let reply = if feasible {
            let mut msg = "Accepted. Resources committed.".to_string();
            if check.shelter_overflow {
                msg.push_str(" Warning: shelter capacity will be exceeded.");
            }
            msg
        } else {
            format!("Rejected: {}", check.reason)
        };
        transcript.push(TranscriptEntry {
            round,
            speaker: "Resource".into(),
            message: reply,
        });
        proposals.push(Proposal {
            round,
            demand: demand.clone(),
            check,
        });

        if feasible {
            return NegotiationResult {
                outcome: NegotiationOutcome::Consensus,
                accepted_demand: demand,
                rounds: round,
                proposals,
                transcript,
            };
        }
        if round < max_rounds {
            if let Some(fix) = fix {
                demand = fix.apply(&demand);
            }
        }
    }

    NegotiationResult {
        outcome: NegotiationOutcome::TimedOut,
        accepted_demand: demand,
        rounds: max_rounds,
        proposals,
        transcript,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("zone-{i}")).collect()
    }

    fn demo_demand() -> EvacuationDemand {
        EvacuationDemand {
            zones: zones(3),
            total_population: 10_700,
            priority: EvacuationPriority::Immediate,
            pumps_requested: 12,
        }
    }

    #[test]
    fn test_feasible_demand() {
        let demand = EvacuationDemand {
            zones: zones(2),
            total_population: 1_000,
            priority: EvacuationPriority::Immediate,
            pumps_requested: 4,
        };
        let check = check_feasibility(&demand, &ResourceInventory::default(), 55);
        assert!(check.feasible);
        assert!(check.reason.is_empty());
        assert!(check.suggested_fix.is_none());
    }

    #[test]
    fn test_infeasible_reasons_combine() {
        let check = check_feasibility(&demo_demand(), &ResourceInventory::default(), 55);
        assert!(!check.feasible);
        assert!(check.reason.contains("pumps"));
        assert!(check.reason.contains("vehicle capacity"));
        let fix = check.suggested_fix.expect("fix offered");
        assert_eq!(fix.priority, Some(EvacuationPriority::Staggered));
        assert_eq!(fix.pumps_requested, Some(8));
    }

    #[test]
    fn test_shelter_overflow_does_not_block() {
        let demand = EvacuationDemand {
            zones: zones(1),
            total_population: 20_000,
            priority: EvacuationPriority::Staggered,
            pumps_requested: 1,
        };
        let check = check_feasibility(&demand, &ResourceInventory::default(), 55);
        assert!(check.feasible);
        assert!(check.shelter_overflow);
    }

    #[test]
    fn test_people_per_vehicle_is_configurable() {
        let demand = EvacuationDemand {
            zones: zones(1),
            total_population: 2_000,
            priority: EvacuationPriority::Immediate,
            pumps_requested: 1,
        };
        let inv = ResourceInventory::default();
        assert!(check_feasibility(&demand, &inv, 55).feasible);
        assert!(!check_feasibility(&demand, &inv, 40).feasible);
    }

    #[test]
    fn test_demo_reaches_consensus_in_round_two() {
        let result = run_dynamic_negotiation(
            demo_demand(),
            &ResourceInventory::default(),
            &NegotiationParams::default(),
        );
        assert!(result.is_consensus());
        assert_eq!(result.rounds, 2);
        assert_eq!(result.proposals.len(), 2);
        assert_eq!(result.accepted_demand.pumps_requested, 8);
        assert_eq!(result.accepted_demand.priority, EvacuationPriority::Staggered);
        assert_eq!(result.transcript.len(), 4);
        assert_eq!(result.transcript[0].speaker, "Response");
        assert_eq!(result.transcript[1].speaker, "Resource");
    }

    #[test]
    fn test_too_many_zones_times_out_after_max_rounds() {
        let demand = EvacuationDemand {
            zones: zones(5),
            ..demo_demand()
        };
        let params = NegotiationParams::default();
        let result = run_dynamic_negotiation(demand, &ResourceInventory::default(), &params);
        assert_eq!(result.outcome, NegotiationOutcome::TimedOut);
        assert_eq!(result.rounds, params.max_rounds);
        assert_eq!(result.proposals.len() as u32, params.max_rounds);
        assert!(result.accepted_demand.pumps_requested <= 8);
    }

    #[test]
    fn test_rounds_bounded_property() {
        let inv = ResourceInventory::default();
        for max_rounds in 1..=6 {
            for zone_count in 1..=6 {
                for pumps in [0, 8, 9, 30] {
                    let demand = EvacuationDemand {
                        zones: zones(zone_count),
                        total_population: 5_000,
                        priority: EvacuationPriority::Immediate,
                        pumps_requested: pumps,
                    };
                    let params = NegotiationParams {
                        max_rounds,
                        ..NegotiationParams::default()
                    };
                    let result = run_dynamic_negotiation(demand, &inv, &params);
                    assert!(result.rounds <= max_rounds);
                    if result.rounds > 1 {
                        assert!(result.accepted_demand.pumps_requested <= inv.pump_units);
                    }
                    if result.is_consensus() {
                        assert!(result.proposals.last().is_some_and(|p| p.check.feasible));
                    } else {
                        assert_eq!(result.rounds, max_rounds);
                    }
                }
            }
        }
    }
}
