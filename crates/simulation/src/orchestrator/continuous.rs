//! Continuous flood loop and the displayed risk gauge.

use bevy::prelude::*;
use serde_json::json;

use crate::agents::AgentKind;
use crate::audit::Severity;
use crate::crisis_params::CrisisParams;
use crate::crisis_state::CrisisStatus;
use crate::event_bus::topics;
use crate::event_store::kinds;
use crate::feed::LogLevel;
use crate::flood_grid::{step_flood_grid, zone_flood_risks, StepInput};
use crate::risk_model::calculate_live_risk_with;
use crate::telemetry::{TelemetryFeed, TelemetryPacket};
use crate::TickCounter;

use super::resources::{CrisisLedger, CrisisRun, DigitalTwin, ORCHESTRATOR};

/// Outcome of one loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSample {
    pub live_risk: f64,
    /// Max of live risk and the wettest zone's flood risk.
    pub sample: f64,
    pub interrupted: bool,
}

/// Advance the twin one step with the current telemetry and check for a
/// sudden escalation during mitigation.
pub fn continuous_step(
    run: &mut CrisisRun,
    twin: &mut DigitalTwin,
    ledger: &mut CrisisLedger,
    params: &CrisisParams,
    telemetry: &TelemetryPacket,
    tick: u64,
) -> LoopSample {
    let input = StepInput::from_telemetry(telemetry, params);
    twin.grid = step_flood_grid(&twin.grid, &input, 1.0);
    let report = twin
        .graph
        .simulate_flood_step_with(telemetry.rainfall, params.risk.rainfall_cap_mm);
    twin.zone_flood = zone_flood_risks(&twin.grid);
    twin.steps += 1;

    for node in &report.newly_flooded {
        ledger.log(
            tick,
            AgentKind::Simulation,
            LogLevel::Warning,
            format!("{node} is flooded"),
        );
    }
    for (from, to) in &report.newly_blocked {
        ledger.log(
            tick,
            AgentKind::Simulation,
            LogLevel::Warning,
            format!("Link {from} -> {to} blocked by flood water"),
        );
    }

    let live_risk = calculate_live_risk_with(telemetry, &params.risk) as f64;
    let wettest = twin.zone_flood.values().copied().fold(0.0, f64::max);
    let sample = live_risk.max(wettest);

    let escalated = run
        .last_sample
        .is_some_and(|prev| sample - prev > params.continuous.escalation_threshold);
    let interrupted =
        run.status() == CrisisStatus::Mitigating && escalated && !run.interrupt_fired;
    if interrupted {
        let prev = run.last_sample.unwrap_or_default();
        let payload = json!({ "previous": prev, "sample": sample });
        ledger.emit(tick, topics::MITIGATION_INTERRUPT, ORCHESTRATOR, payload.clone());
        ledger.record(tick, kinds::MITIGATION_INTERRUPTED, ORCHESTRATOR, payload);
        if let Err(e) = ledger.decision(
            tick,
            AgentKind::Governance,
            "reauthorized",
            &format!("risk jumped {prev:.1} -> {sample:.1} during mitigation"),
            Severity::Warning,
        ) {
            ledger.log(
                tick,
                AgentKind::Governance,
                LogLevel::Error,
                format!("Could not chain reauthorization: {e}"),
            );
        }
        ledger.log(
            tick,
            ORCHESTRATOR,
            LogLevel::Warning,
            format!("Risk escalated {prev:.1} -> {sample:.1} during mitigation; plan reauthorized"),
        );
        run.interrupt_fired = true;
    }

    run.last_sample = Some(sample);
    run.metrics.observe(live_risk);
    ledger.metric(tick, "risk", live_risk);
    LoopSample {
        live_risk,
        sample,
        interrupted,
    }
}

pub fn run_continuous_loop(
    tick: Res<TickCounter>,
    params: Res<CrisisParams>,
    feed: Res<TelemetryFeed>,
    mut run: ResMut<CrisisRun>,
    mut twin: ResMut<DigitalTwin>,
    mut ledger: ResMut<CrisisLedger>,
) {
    let interval = params.continuous.interval_ticks.max(1);
    if !params.continuous.enabled
        || !run.continuous_active
        || twin.checked_out
        || tick.0 % interval != 0
    {
        return;
    }
    continuous_step(
        &mut run,
        &mut twin,
        &mut ledger,
        &params,
        &feed.current(),
        tick.0,
    );
}

pub fn advance_risk_gauge(params: Res<CrisisParams>, mut gauge: ResMut<super::RiskGauge>) {
    gauge.advance(params.pacing.gauge_step);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mitigating_run() -> CrisisRun {
        let mut run = CrisisRun::default();
        for to in [
            CrisisStatus::Detected,
            CrisisStatus::Simulating,
            CrisisStatus::Negotiating,
            CrisisStatus::Mitigating,
        ] {
            run.status.transition(to).unwrap();
        }
        run
    }

    #[test]
    fn test_first_sample_never_interrupts() {
        let params = CrisisParams::default();
        let mut run = mitigating_run();
        let mut twin = DigitalTwin::default();
        let mut ledger = CrisisLedger::default();
        let s = continuous_step(
            &mut run,
            &mut twin,
            &mut ledger,
            &params,
            &TelemetryPacket::STORM,
            5,
        );
        assert!(!s.interrupted);
        assert_eq!(run.last_sample, Some(s.sample));
        assert_eq!(twin.steps, 1);
    }

    #[test]
    fn test_jump_interrupts_once() {
        let params = CrisisParams::default();
        let mut run = mitigating_run();
        let mut twin = DigitalTwin::default();
        let mut ledger = CrisisLedger::default();
        run.last_sample = Some(10.0);
        let s = continuous_step(
            &mut run,
            &mut twin,
            &mut ledger,
            &params,
            &TelemetryPacket::STORM,
            5,
        );
        assert!(s.interrupted);
        assert!(run.interrupt_fired);
        assert_eq!(ledger.audit.chained().count(), 1);

        run.last_sample = Some(10.0);
        let again = continuous_step(
            &mut run,
            &mut twin,
            &mut ledger,
            &params,
            &TelemetryPacket::STORM,
            10,
        );
        assert!(!again.interrupted);
        assert_eq!(ledger.audit.chained().count(), 1);
    }

    #[test]
    fn test_jump_outside_mitigation_is_ignored() {
        let params = CrisisParams::default();
        let mut run = CrisisRun::default();
        run.status.transition(CrisisStatus::Detected).unwrap();
        run.last_sample = Some(0.0);
        let mut twin = DigitalTwin::default();
        let mut ledger = CrisisLedger::default();
        let s = continuous_step(
            &mut run,
            &mut twin,
            &mut ledger,
            &params,
            &TelemetryPacket::STORM,
            5,
        );
        assert!(!s.interrupted);
        assert!(!run.interrupt_fired);
    }
}
