//! Assertion helpers for `TestCrisis` integration tests.

use crate::chain_hash::ChainVerification;
use crate::crisis_state::CrisisStatus;
use crate::orchestrator::Phase;
use crate::zones::ZoneStatus;

use super::TestCrisis;

impl TestCrisis {
    // -----------------------------------------------------------------------
    // Assertions
    // -----------------------------------------------------------------------

    pub fn assert_status(&self, expected: CrisisStatus) {
        let status = self.status();
        assert_eq!(status, expected, "Expected status {expected}, got {status}");
    }

    /// Assert all seven phases ran, in order.
    pub fn assert_all_phases_completed(&self) {
        assert_eq!(
            self.run().completed_phases(),
            &Phase::ALL,
            "phases out of order or missing"
        );
    }

    pub fn assert_chain_valid(&self) {
        let verification = self.audit().verify_chain();
        assert_eq!(
            verification,
            ChainVerification::Valid,
            "decision chain does not verify"
        );
    }

    pub fn assert_zone_status(&self, id: &str, expected: ZoneStatus) {
        let zone = self
            .zone(id)
            .unwrap_or_else(|| panic!("unknown zone {id}"));
        assert_eq!(
            zone.status, expected,
            "Expected {id} to be {expected:?}, found {:?}",
            zone.status
        );
    }

    /// Assert that `agent` logged a message containing `needle`.
    pub fn assert_logged(&self, agent: &str, needle: &str) {
        let logs = self.logs_from(agent);
        assert!(
            logs.iter().any(|m| m.contains(needle)),
            "Expected a {agent} log containing {needle:?}, got {logs:#?}"
        );
    }

    /// Assert that the store holds at least one event of `event_type`.
    pub fn assert_event_recorded(&self, event_type: &str) {
        assert!(
            self.event_types().iter().any(|t| t == event_type),
            "Expected a {event_type} event in the store"
        );
    }

    /// Assert that every status change in the store follows the adjacency
    /// table, except forced resets to idle.
    pub fn assert_transitions_legal(&self) {
        for event in self.store().events() {
            if event.event_type() != crate::event_store::kinds::STATUS_CHANGED {
                continue;
            }
            let payload = event.payload();
            if payload.get("forced").and_then(|v| v.as_bool()) == Some(true) {
                continue;
            }
            let from: CrisisStatus = serde_json::from_value(payload["from"].clone())
                .unwrap_or_else(|e| panic!("bad status payload {payload}: {e}"));
            let to: CrisisStatus = serde_json::from_value(payload["to"].clone())
                .unwrap_or_else(|e| panic!("bad status payload {payload}: {e}"));
            assert!(
                from.can_transition_to(to),
                "illegal transition {from} -> {to} recorded"
            );
        }
    }
}
