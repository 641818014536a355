//! Ingest systems: operator control signals first, then telemetry.

use bevy::prelude::*;
use serde_json::json;

use crate::crisis_params::CrisisParams;
use crate::event_bus::topics;
use crate::event_store::kinds;
use crate::feed::LogLevel;
use crate::telemetry::{Ingest, SyntheticTelemetry, TelemetryFeed, TelemetryPacket};
use crate::TickCounter;

use super::assessment::AssessmentTasks;
use super::events::{AbortCrisis, GrantHumanApproval, InjectCrisis, TelemetryReading};
use super::phases::RunCtx;
use super::resources::{
    CrisisLedger, CrisisRun, DigitalTwin, FaultInjection, RiskGauge, RunStage, ORCHESTRATOR,
};

/// Source name used for operator-originated entries.
pub const OPERATOR: &str = "Operator";

#[allow(clippy::too_many_arguments)]
pub fn handle_control_signals(
    tick: Res<TickCounter>,
    params: Res<CrisisParams>,
    faults: Res<FaultInjection>,
    feed: Res<TelemetryFeed>,
    mut injects: EventReader<InjectCrisis>,
    mut approvals: EventReader<GrantHumanApproval>,
    mut aborts: EventReader<AbortCrisis>,
    mut run: ResMut<CrisisRun>,
    mut twin: ResMut<DigitalTwin>,
    mut ledger: ResMut<CrisisLedger>,
    mut tasks: ResMut<AssessmentTasks>,
    mut synthetic: ResMut<SyntheticTelemetry>,
    mut gauge: ResMut<RiskGauge>,
) {
    let mut ctx = RunCtx {
        run: &mut run,
        twin: &mut twin,
        ledger: &mut ledger,
        tasks: &mut tasks,
        synthetic: &mut synthetic,
        gauge: &mut gauge,
        params: &params,
        faults: &faults,
        telemetry: feed.current(),
        tick: tick.0,
    };

    for abort in aborts.read() {
        if ctx.run.in_progress() {
            ctx.abort_run(&abort.reason, false);
        } else {
            ctx.ledger.log(
                tick.0,
                OPERATOR,
                LogLevel::Warning,
                format!("Abort ignored, no crisis in progress: {}", abort.reason),
            );
        }
    }

    for _ in injects.read() {
        if ctx.run.in_progress() {
            warn!("InjectCrisis ignored: run #{} in progress", ctx.run.run_id);
            ctx.ledger.log(
                tick.0,
                ORCHESTRATOR,
                LogLevel::Warning,
                "Crisis already in progress; injection ignored",
            );
        } else {
            ctx.start_run();
        }
    }

    for approval in approvals.read() {
        if matches!(ctx.run.stage, RunStage::AwaitingApproval { .. }) {
            ctx.ledger.emit(
                tick.0,
                topics::HUMAN_APPROVAL_GIVEN,
                OPERATOR,
                json!({ "approver": approval.approver }),
            );
        } else {
            ctx.ledger.log(
                tick.0,
                OPERATOR,
                LogLevel::Warning,
                format!(
                    "Approval from {} ignored, nothing awaits approval",
                    approval.approver
                ),
            );
        }
    }
}

fn accept_packet(
    feed: &mut TelemetryFeed,
    ledger: &mut CrisisLedger,
    packet: TelemetryPacket,
    source: &str,
    tick: u64,
) {
    match feed.ingest(packet, tick) {
        Ingest::Accepted => {
            ledger.record(tick, kinds::TELEMETRY_ACCEPTED, source, json!(packet));
        }
        Ingest::Rejected(reason) => {
            ledger.record(
                tick,
                kinds::TELEMETRY_REJECTED,
                source,
                json!({ "reason": reason, "packet": packet }),
            );
            ledger.log(
                tick,
                source,
                LogLevel::Warning,
                format!("Telemetry packet rejected: {reason}"),
            );
        }
    }
}

pub fn ingest_telemetry(
    tick: Res<TickCounter>,
    params: Res<CrisisParams>,
    mut readings: EventReader<TelemetryReading>,
    mut synthetic: ResMut<SyntheticTelemetry>,
    mut feed: ResMut<TelemetryFeed>,
    mut ledger: ResMut<CrisisLedger>,
) {
    for TelemetryReading(packet) in readings.read() {
        accept_packet(&mut feed, &mut ledger, *packet, "external", tick.0);
    }
    if let Some(packet) = synthetic.poll(tick.0) {
        accept_packet(&mut feed, &mut ledger, packet, "synthetic", tick.0);
    }
    if feed.check_gap(tick.0, params.telemetry.stale_after_ticks) {
        let since = feed
            .last_arrival_tick()
            .map_or_else(|| "never".to_string(), |t| format!("tick {t}"));
        ledger.log(
            tick.0,
            ORCHESTRATOR,
            LogLevel::Warning,
            format!("Telemetry gap: no packet since {since}, holding last known values"),
        );
    }
}
