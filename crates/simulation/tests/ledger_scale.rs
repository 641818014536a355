//! Scale tests for the append-only records and the sampling engines.
//!
//! These exercise the public API at sizes well past a single crisis run:
//! - 100K events appended and replayed into a projection
//! - 5K chained governance decisions verified end to end
//! - 50K Monte Carlo scenarios stay deterministic for a fixed seed
//!
//! Run: cargo test -p simulation --test ledger_scale

use std::time::Instant;

use serde_json::json;

use simulation::audit::{AuditTrail, Severity};
use simulation::chain_hash::{ChainVerification, DecisionChain};
use simulation::crisis_params::CrisisParams;
use simulation::event_store::{kinds, EventStore};
use simulation::monte_carlo::run_monte_carlo_with;
use simulation::projection::CrisisProjection;
use simulation::telemetry::TelemetryPacket;

// ---------------------------------------------------------------------------
// 1. Event store replay at 100K events
// ---------------------------------------------------------------------------

#[test]
fn test_event_store_replays_100k_events() {
    let mut store = EventStore::default();
    store.append(kinds::CRISIS_STARTED, "Orchestrator", json!({ "run_id": 1 }), 0);
    for i in 1..100_000u64 {
        let risk = (i % 100) as f64;
        store.append(
            kinds::METRIC_UPDATED,
            "Orchestrator",
            json!({ "name": "risk", "value": risk }),
            i,
        );
    }
    assert_eq!(store.len(), 100_000);
    assert_eq!(store.last_sequence(), 100_000);

    let start = Instant::now();
    let projection = CrisisProjection::replay(&store);
    let elapsed = start.elapsed();

    assert_eq!(projection.events_applied, 100_000);
    assert_eq!(projection.peak_risk, 99.0);
    assert_eq!(projection.metrics.get("risk"), Some(&99.0));
    assert!(
        elapsed.as_secs() < 10,
        "replay of 100K events took {elapsed:?}"
    );
}

#[test]
fn test_since_returns_tail_only() {
    let mut store = EventStore::default();
    for i in 0..10_000u64 {
        store.append(kinds::TELEMETRY_ACCEPTED, "synthetic", json!({ "i": i }), i);
    }
    let tail = store.since(9_990);
    assert_eq!(tail.len(), 10);
    assert_eq!(tail[0].sequence(), 9_991);
    assert!(store.since(20_000).is_empty());
}

// ---------------------------------------------------------------------------
// 2. Decision chain with 5K links
// ---------------------------------------------------------------------------

#[test]
fn test_long_decision_chain_verifies() {
    let mut trail = AuditTrail::default();
    let mut chain = DecisionChain::default();
    for i in 0..5_000u64 {
        trail.record(i, "Sentinel", "anomaly_detected", "zone-1", Severity::Warning);
        trail
            .record_decision(
                &mut chain,
                i,
                "Governance",
                "approved",
                &format!("decision {i}"),
                Severity::Info,
            )
            .expect("decision hashes");
    }
    assert_eq!(trail.len(), 10_000);
    assert_eq!(chain.links().len(), 5_000);

    let start = Instant::now();
    assert_eq!(trail.verify_chain(), ChainVerification::Valid);
    assert_eq!(DecisionChain::verify(chain.links()), ChainVerification::Valid);
    assert!(start.elapsed().as_secs() < 10);
}

#[test]
fn test_broken_link_is_located_in_long_chain() {
    let mut chain = DecisionChain::default();
    for i in 0..1_000u32 {
        chain
            .chain_hash_decision(&json!({ "n": i }))
            .expect("decision hashes");
    }
    let mut links = chain.links().to_vec();
    links[777].decision = json!({ "n": -1 });
    assert_eq!(DecisionChain::verify(&links), ChainVerification::BrokenAt(777));
}

// ---------------------------------------------------------------------------
// 3. Monte Carlo at 50K scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_monte_carlo_50k_is_deterministic() {
    let params = CrisisParams::default();
    let run = || {
        run_monte_carlo_with(
            &TelemetryPacket::STORM,
            50_000,
            params.monte_carlo.seed,
            &params.monte_carlo,
            &params.risk,
        )
    };
    let a = run();
    let b = run();
    assert_eq!(a.scenarios_run, 50_000);
    assert_eq!(a.mean, b.mean);
    assert_eq!(a.std_dev, b.std_dev);
    assert!(a.ci95[0] <= a.mean && a.mean <= a.ci95[1]);
    assert!(a.worst_case <= 100.0);
}
