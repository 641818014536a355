//! The event log replays into the live state; the audit chain catches edits.

use crate::audit::AuditTrail;
use crate::chain_hash::ChainVerification;
use crate::crisis_state::CrisisStatus;
use crate::negotiation::NegotiationOutcome;
use crate::orchestrator::{Phase, RunOutcome};
use crate::projection::{CrisisProjection, ProjectedOutcome};
use crate::test_harness::TestCrisis;

fn resolved_run() -> TestCrisis {
    let mut crisis = TestCrisis::new();
    crisis.inject();
    crisis.run_to_completion(400);
    crisis
}

/// Round-trip the trail through JSON with one entry's detail rewritten.
fn tampered(trail: &AuditTrail, index: usize, detail: &str) -> AuditTrail {
    let mut value = serde_json::to_value(trail).expect("trail serializes");
    value["entries"][index]["detail"] = serde_json::Value::from(detail);
    serde_json::from_value(value).expect("trail deserializes")
}

#[test]
fn test_projection_matches_live_run() {
    let crisis = resolved_run();
    let projection = crisis.projection();
    let run = crisis.run();

    assert_eq!(projection.runs, 1);
    assert_eq!(projection.status, CrisisStatus::Resolved);
    assert_eq!(projection.peak_risk, run.metrics.peak_risk);
    assert_eq!(projection.chain_head.as_deref(), Some(crisis.ledger().chain.head()));
    assert_eq!(
        projection.plan_action.as_deref(),
        run.plan.as_ref().map(|p| p.action.as_str())
    );
    assert_eq!(projection.negotiation_outcome, Some(NegotiationOutcome::Consensus));
    assert_eq!(projection.outcome, Some(ProjectedOutcome::Resolved));
    assert_eq!(projection.rejected_transitions, 0);
    assert_eq!(projection.agent_failures, 0);
    assert_eq!(projection.events_applied, crisis.store().len() as u64);

    assert!(!projection.zones.is_empty());
    for (id, view) in &projection.zones {
        let zone = crisis.zone(id).expect("projected zone exists");
        assert_eq!(view.status, zone.status, "{id}");
        assert_eq!(view.risk, zone.risk_level, "{id}");
    }
}

#[test]
fn test_projection_of_aborted_run() {
    let mut crisis = TestCrisis::new();
    crisis.inject();
    assert!(crisis.tick_until_status(CrisisStatus::Negotiating, 200));
    crisis.abort("exercise ended");
    crisis.tick(1);
    let projection = crisis.projection();
    assert_eq!(projection.status, CrisisStatus::Idle);
    assert_eq!(projection.outcome, Some(ProjectedOutcome::Aborted));
}

#[test]
fn test_replay_is_deterministic() {
    let crisis = resolved_run();
    let first = CrisisProjection::replay(crisis.store());
    let second = CrisisProjection::replay(crisis.store());
    assert_eq!(first, second);
}

#[test]
fn test_incremental_replay_matches_full_replay() {
    let crisis = resolved_run();
    let events = crisis.store().events();
    let mut incremental = CrisisProjection::default();
    for event in events {
        incremental.apply(event);
    }
    assert_eq!(incremental, crisis.projection());
}

#[test]
fn test_event_sequences_are_monotonic() {
    let crisis = resolved_run();
    let events = crisis.store().events();
    for pair in events.windows(2) {
        assert!(pair[0].sequence() < pair[1].sequence());
        assert!(pair[0].timestamp() <= pair[1].timestamp());
    }
    assert_eq!(crisis.store().last_sequence(), events.len() as u64);
    let since = crisis.store().since(events.len() as u64 - 3);
    assert_eq!(since.len(), 3);
}

#[test]
fn test_edited_decision_breaks_the_chain() {
    let crisis = resolved_run();
    let trail = crisis.audit();
    assert_eq!(trail.verify_chain(), ChainVerification::Valid);

    let entries = trail.entries();
    let chained: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_chained())
        .map(|(i, _)| i)
        .collect();
    assert!(chained.len() >= 2);

    let first = tampered(trail, chained[0], "approver=nobody");
    assert_eq!(first.verify_chain(), ChainVerification::BrokenAt(0));

    let last = chained.len() - 1;
    let tail = tampered(trail, chained[last], "peak=0");
    assert_eq!(tail.verify_chain(), ChainVerification::BrokenAt(last));

    // Unchained entries are outside the chain.
    let unchained = (0..entries.len())
        .find(|i| !chained.contains(i))
        .expect("unchained entries exist");
    let edited = tampered(trail, unchained, "rewritten");
    assert_eq!(edited.verify_chain(), ChainVerification::Valid);
}

#[test]
fn test_report_reflects_run() {
    let crisis = resolved_run();
    let report = crisis.report();
    assert_eq!(report.run_id, 1);
    assert_eq!(report.status, CrisisStatus::Resolved);
    assert_eq!(report.phases, Phase::ALL);
    assert_eq!(report.outcome, Some(RunOutcome::Resolved));
    assert_eq!(report.audit_trail.len(), crisis.audit().len());
    assert_eq!(report.negotiation_transcript.len(), 4);
    assert!(report.mitigation_plan.is_some());
    assert!(report.chain_verified);
    assert_eq!(report.chain_head, crisis.ledger().chain.head());

    let json = report.to_json_pretty().expect("report serializes");
    assert!(json.contains("\"chain_verified\": true"));
    assert!(json.contains("\"run_id\": 1"));
}
