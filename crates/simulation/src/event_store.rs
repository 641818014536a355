//! Append-only event store.
//!
//! Every state change the orchestrator makes is appended here as a
//! [`SystemEvent`]. Events are immutable once appended (no field is public and
//! the store never hands out mutable references) and `sequence` counts up
//! from 1 with no gaps, so any derived state can be rebuilt with
//! [`EventStore::replay`].

use serde::{Deserialize, Serialize};

/// Event type names written by the orchestrator.
pub mod kinds {
    pub const CRISIS_STARTED: &str = "crisis.started";
    pub const STATUS_CHANGED: &str = "crisis.status_changed";
    pub const PHASE_ENTERED: &str = "crisis.phase_entered";
    pub const TRANSITION_REJECTED: &str = "crisis.transition_rejected";
    pub const ZONE_UPDATED: &str = "zone.updated";
    pub const METRIC_UPDATED: &str = "metric.updated";
    pub const TELEMETRY_ACCEPTED: &str = "telemetry.accepted";
    pub const TELEMETRY_REJECTED: &str = "telemetry.rejected";
    pub const AGENT_FAILED: &str = "agent.failed";
    pub const PLAN_CREATED: &str = "plan.created";
    pub const NEGOTIATION_COMPLETED: &str = "negotiation.completed";
    pub const AUDIT_APPENDED: &str = "audit.appended";
    pub const MITIGATION_INTERRUPTED: &str = "mitigation.interrupted";
    pub const CRISIS_RESOLVED: &str = "crisis.resolved";
    pub const CRISIS_ABORTED: &str = "crisis.aborted";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    id: String,
    event_type: String,
    source: String,
    payload: serde_json::Value,
    timestamp: u64,
    sequence: u64,
}

impl SystemEvent {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Tick at which the event was appended.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Filter for [`EventStore::query`]; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub event_type: Option<String>,
    pub source: Option<String>,
    /// Inclusive tick range.
    pub from_tick: Option<u64>,
    pub to_tick: Option<u64>,
}

impl EventQuery {
    pub fn of_type(event_type: &str) -> Self {
        Self {
            event_type: Some(event_type.to_string()),
            ..Self::default()
        }
    }

    pub fn from_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn between(mut self, from_tick: u64, to_tick: u64) -> Self {
        self.from_tick = Some(from_tick);
        self.to_tick = Some(to_tick);
        self
    }

    fn matches(&self, event: &SystemEvent) -> bool {
        self.event_type
            .as_deref()
            .is_none_or(|t| t == event.event_type)
            && self.source.as_deref().is_none_or(|s| s == event.source)
            && self.from_tick.is_none_or(|t| event.timestamp >= t)
            && self.to_tick.is_none_or(|t| event.timestamp <= t)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<SystemEvent>,
}

impl EventStore {
    /// Append an event and return it. The only way events enter the store.
    pub fn append(
        &mut self,
        event_type: &str,
        source: &str,
        payload: serde_json::Value,
        tick: u64,
    ) -> &SystemEvent {
        let sequence = self.events.len() as u64 + 1;
        self.events.push(SystemEvent {
            id: format!("evt-{sequence:06}"),
            event_type: event_type.to_string(),
            source: source.to_string(),
            payload,
            timestamp: tick,
            sequence,
        });
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[SystemEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.events.last().map_or(0, |e| e.sequence)
    }

    /// Events with a sequence greater than `sequence`.
    pub fn since(&self, sequence: u64) -> &[SystemEvent] {
        let start = (sequence as usize).min(self.events.len());
        &self.events[start..]
    }

    pub fn query(&self, query: &EventQuery) -> Vec<&SystemEvent> {
        self.events.iter().filter(|e| query.matches(e)).collect()
    }

    /// Fold the whole log, oldest first, into a state.
    pub fn replay<S, F>(&self, initial: S, mut reducer: F) -> S
    where
        F: FnMut(S, &SystemEvent) -> S,
    {
        self.events.iter().fold(initial, |state, e| reducer(state, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_store() -> EventStore {
        let mut store = EventStore::default();
        store.append(kinds::CRISIS_STARTED, "orchestrator", json!({"run": 1}), 1);
        store.append(kinds::ZONE_UPDATED, "sentinel", json!({"zone": "zone-1"}), 2);
        store.append(kinds::ZONE_UPDATED, "risk", json!({"zone": "zone-2"}), 5);
        store.append(kinds::METRIC_UPDATED, "risk", json!({"risk": 83}), 9);
        store
    }

    #[test]
    fn test_sequence_is_gapless_from_one() {
        let store = sample_store();
        for (i, event) in store.events().iter().enumerate() {
            assert_eq!(event.sequence(), i as u64 + 1);
        }
        assert_eq!(store.events()[0].id(), "evt-000001");
        assert_eq!(store.last_sequence(), 4);
    }

    #[test]
    fn test_appended_events_never_change() {
        let mut store = sample_store();
        let before: Vec<SystemEvent> = store.events().to_vec();
        for tick in 10..60 {
            store.append("noise", "test", json!(tick), tick);
        }
        assert_eq!(&store.events()[..before.len()], before.as_slice());
    }

    #[test]
    fn test_query_filters_combine() {
        let store = sample_store();
        assert_eq!(store.query(&EventQuery::of_type(kinds::ZONE_UPDATED)).len(), 2);
        assert_eq!(
            store
                .query(&EventQuery::of_type(kinds::ZONE_UPDATED).from_source("risk"))
                .len(),
            1
        );
        assert_eq!(store.query(&EventQuery::default().between(2, 5)).len(), 2);
        assert_eq!(store.query(&EventQuery::default().from_source("risk")).len(), 2);
        assert!(store.query(&EventQuery::of_type("missing")).is_empty());
    }

    #[test]
    fn test_since_cursor() {
        let store = sample_store();
        assert_eq!(store.since(0).len(), 4);
        assert_eq!(store.since(3).len(), 1);
        assert_eq!(store.since(3)[0].sequence(), 4);
        assert!(store.since(99).is_empty());
    }

    #[test]
    fn test_replay_rebuilds_state() {
        let store = sample_store();
        let zones = store.replay(Vec::new(), |mut acc: Vec<String>, e| {
            if e.event_type() == kinds::ZONE_UPDATED {
                if let Some(z) = e.payload()["zone"].as_str() {
                    acc.push(z.to_string());
                }
            }
            acc
        });
        assert_eq!(zones, vec!["zone-1", "zone-2"]);
        let count = store.replay(0usize, |n, _| n + 1);
        assert_eq!(count, store.len());
    }
}
