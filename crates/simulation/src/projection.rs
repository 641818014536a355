//! Read model rebuilt purely from the event store.
//!
//! [`CrisisProjection::replay`] folds the log oldest-first. Replaying the same
//! log always yields the same projection, and for a completed run it agrees
//! with the live [`crate::orchestrator::CrisisRun`] on status, zones, peak
//! risk and chain head.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crisis_state::CrisisStatus;
use crate::event_store::{kinds, EventStore, SystemEvent};
use crate::negotiation::NegotiationOutcome;
use crate::zones::ZoneStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneView {
    pub status: ZoneStatus,
    pub risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectedOutcome {
    Resolved,
    Aborted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrisisProjection {
    /// Runs seen in the log.
    pub runs: u32,
    pub status: CrisisStatus,
    pub zones: BTreeMap<String, ZoneView>,
    pub metrics: BTreeMap<String, f64>,
    pub peak_risk: f64,
    pub plan_action: Option<String>,
    pub negotiation_outcome: Option<NegotiationOutcome>,
    pub chain_head: Option<String>,
    pub rejected_transitions: u32,
    pub agent_failures: u32,
    pub outcome: Option<ProjectedOutcome>,
    pub events_applied: u64,
}

fn field<T: for<'de> Deserialize<'de>>(payload: &Value, key: &str) -> Option<T> {
    payload
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

impl CrisisProjection {
    pub fn replay(store: &EventStore) -> Self {
        store.replay(Self::default(), |mut state, event| {
            state.apply(event);
            state
        })
    }

    pub fn apply(&mut self, event: &SystemEvent) {
        let payload = event.payload();
        self.events_applied += 1;
        match event.event_type() {
            kinds::CRISIS_STARTED => {
                // Only the status carries across runs. Zones start again from
                // their baselines, which are never logged.
                *self = Self {
                    runs: self.runs + 1,
                    status: self.status,
                    events_applied: self.events_applied,
                    ..Self::default()
                };
            }
            kinds::STATUS_CHANGED => {
                if let Some(to) = field(payload, "to") {
                    self.status = to;
                }
            }
            kinds::TRANSITION_REJECTED => self.rejected_transitions += 1,
            kinds::ZONE_UPDATED => {
                if let (Some(zone), Some(status), Some(risk)) = (
                    field::<String>(payload, "zone"),
                    field(payload, "status"),
                    field(payload, "risk"),
                ) {
                    self.zones.insert(zone, ZoneView { status, risk });
                }
            }
            kinds::METRIC_UPDATED => {
                if let (Some(name), Some(value)) =
                    (field::<String>(payload, "name"), field::<f64>(payload, "value"))
                {
                    if name == "risk" {
                        self.peak_risk = self.peak_risk.max(value);
                    }
                    self.metrics.insert(name, value);
                }
            }
            kinds::PLAN_CREATED => self.plan_action = field(payload, "action"),
            kinds::NEGOTIATION_COMPLETED => {
                self.negotiation_outcome = field(payload, "outcome");
            }
            kinds::AUDIT_APPENDED => {
                if let Some(hash) = field::<String>(payload, "hash") {
                    self.chain_head = Some(hash);
                }
            }
            kinds::AGENT_FAILED => self.agent_failures += 1,
            kinds::CRISIS_RESOLVED => self.outcome = Some(ProjectedOutcome::Resolved),
            kinds::CRISIS_ABORTED => self.outcome = Some(ProjectedOutcome::Aborted),
            _ => {}
        }
    }

    pub fn zone(&self, id: &str) -> Option<&ZoneView> {
        self.zones.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> EventStore {
        let mut s = EventStore::default();
        s.append(kinds::CRISIS_STARTED, "Orchestrator", json!({"run_id": 1}), 1);
        s.append(
            kinds::STATUS_CHANGED,
            "Orchestrator",
            json!({"from": "idle", "to": "detected"}),
            2,
        );
        s.append(
            kinds::ZONE_UPDATED,
            "Orchestrator",
            json!({"zone": "zone-1", "status": "critical", "risk": 63.5}),
            2,
        );
        s.append(kinds::METRIC_UPDATED, "Orchestrator", json!({"name": "risk", "value": 83.0}), 2);
        s.append(kinds::METRIC_UPDATED, "Orchestrator", json!({"name": "risk", "value": 40.0}), 3);
        s.append(
            kinds::AUDIT_APPENDED,
            "Governance",
            json!({"seq": 1, "action": "approved", "hash": "ab12", "previous_hash": "00"}),
            4,
        );
        s.append(
            kinds::AUDIT_APPENDED,
            "Response",
            json!({"seq": 2, "action": "execution_started", "hash": null}),
            5,
        );
        s
    }

    #[test]
    fn test_replay_tracks_latest_values() {
        let p = CrisisProjection::replay(&store());
        assert_eq!(p.runs, 1);
        assert_eq!(p.status, CrisisStatus::Detected);
        assert_eq!(p.zone("zone-1").map(|z| z.status), Some(ZoneStatus::Critical));
        assert_eq!(p.metrics.get("risk"), Some(&40.0));
        assert_eq!(p.peak_risk, 83.0);
        // Unchained entries leave the head alone.
        assert_eq!(p.chain_head.as_deref(), Some("ab12"));
        assert_eq!(p.events_applied, 7);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let s = store();
        assert_eq!(CrisisProjection::replay(&s), CrisisProjection::replay(&s));
    }

    #[test]
    fn test_new_run_resets_run_scoped_state() {
        let mut s = store();
        s.append(kinds::CRISIS_STARTED, "Orchestrator", json!({"run_id": 2}), 10);
        let p = CrisisProjection::replay(&s);
        assert_eq!(p.runs, 2);
        assert_eq!(p.peak_risk, 0.0);
        assert!(p.chain_head.is_none());
        assert!(p.zone("zone-1").is_none());
        assert_eq!(p.status, CrisisStatus::Detected);
    }
}
