use crate::event_store::kinds;
use crate::orchestrator::ORCHESTRATOR;
use crate::telemetry::TelemetryPacket;
use crate::test_harness::TestCrisis;

fn manual_feed() -> TestCrisis {
    TestCrisis::new().without_synthetic_telemetry()
}

#[test]
fn test_invalid_packet_is_rejected_and_logged() {
    let mut crisis = manual_feed();
    crisis.send_telemetry(TelemetryPacket::new(-4.0, 0.5, 0.5, 0.1)).tick(1);

    assert_eq!(crisis.telemetry().rejected_count(), 1);
    assert_eq!(crisis.telemetry().accepted_count(), 0);
    assert!(!crisis.telemetry().has_reading());
    crisis.assert_event_recorded(kinds::TELEMETRY_REJECTED);
    crisis.assert_logged("external", "rainfall -4 is negative");
    // Last known good is still the nominal default.
    assert_eq!(crisis.telemetry().current(), TelemetryPacket::NOMINAL);
}

#[test]
fn test_valid_packet_becomes_current() {
    let mut crisis = manual_feed();
    crisis.send_telemetry(TelemetryPacket::STORM).tick(1);
    assert_eq!(crisis.telemetry().current(), TelemetryPacket::STORM);
    assert_eq!(crisis.telemetry().last_arrival_tick(), Some(crisis.tick_count()));

    let accepted = crisis
        .store()
        .events()
        .iter()
        .find(|e| e.event_type() == kinds::TELEMETRY_ACCEPTED)
        .expect("accepted packet recorded");
    assert_eq!(accepted.source(), "external");
    assert_eq!(accepted.payload()["rainfall"], 128.0);
}

#[test]
fn test_out_of_range_fraction_keeps_last_good() {
    let mut crisis = manual_feed();
    crisis.send_telemetry(TelemetryPacket::STORM).tick(1);
    crisis.send_telemetry(TelemetryPacket::new(40.0, 1.4, 0.5, 0.1)).tick(1);
    assert_eq!(crisis.telemetry().current(), TelemetryPacket::STORM);
    crisis.assert_logged("external", "drainage_capacity 1.4 is outside [0, 1]");
}

#[test]
fn test_gap_is_reported_once_per_silence() {
    let mut crisis = manual_feed();
    let stale_after = crisis.params().telemetry.stale_after_ticks as u32;
    let gaps = |c: &TestCrisis| {
        c.logs_from(ORCHESTRATOR)
            .iter()
            .filter(|m| m.starts_with("Telemetry gap"))
            .count()
    };

    crisis.tick(stale_after - 3);
    assert_eq!(gaps(&crisis), 0);
    crisis.tick(4);
    assert_eq!(gaps(&crisis), 1);
    crisis.tick(stale_after * 2);
    assert_eq!(gaps(&crisis), 1);

    crisis.send_telemetry(TelemetryPacket::NOMINAL).tick(1);
    crisis.tick(stale_after + 1);
    assert_eq!(gaps(&crisis), 2);
    crisis.assert_logged(ORCHESTRATOR, "holding last known values");
}

#[test]
fn test_synthetic_source_follows_the_run() {
    let mut crisis = TestCrisis::new();
    crisis.tick(1);
    assert_eq!(crisis.telemetry().accepted_count(), 1);
    let quiet = crisis.telemetry().current();
    assert!((quiet.rainfall - TelemetryPacket::NOMINAL.rainfall).abs() < 1.0);

    crisis.inject();
    crisis.tick(1);
    assert!(crisis.telemetry().current().rainfall > 120.0);
    let sources: Vec<&str> = crisis
        .store()
        .events()
        .iter()
        .filter(|e| e.event_type() == kinds::TELEMETRY_ACCEPTED)
        .map(|e| e.source())
        .collect();
    assert!(sources.iter().all(|s| *s == "synthetic"));

    crisis.run_to_completion(400);
    // Back to quiet weather after resolution.
    crisis.tick(10);
    assert!(crisis.telemetry().current().rainfall < 20.0);
}
