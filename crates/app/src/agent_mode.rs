//! Headless `--agent` mode: a blocking synchronous loop that reads JSON
//! commands from stdin and writes JSON responses to stdout.
//!
//! ## Protocol
//!
//! Each line of stdin is a JSON object with a `"cmd"` discriminator.
//! Each line of stdout is a JSON response with `"protocol_version"` and
//! `"type"` fields. See [`simulation::agent_protocol`] for the full schema.
//!
//! The engine only advances on `step`; signals sent with `inject_crisis`,
//! `approve`, `abort` and `telemetry` are read on the next tick.

use std::io::{BufRead, Write};

use bevy::prelude::*;

use simulation::agent_protocol::{
    make_response, AgentCommand, AgentResponse, CrisisObservation, ResponsePayload,
    PROTOCOL_VERSION,
};
use simulation::orchestrator::{
    AbortCrisis, CrisisLedger, CrisisRun, FaultInjection, GrantHumanApproval, InjectCrisis,
    RiskGauge, TelemetryReading,
};
use simulation::CrisisParams;

use crate::engine;

/// Upper bound on a single `step` so a typo cannot stall the session.
const MAX_STEP_TICKS: u64 = 10_000;

pub fn run_agent_mode(params: CrisisParams) {
    let mut app = engine::build_engine(params, true);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();

    // Tells the external program the engine is live.
    emit(&mut stdout, &make_response(ResponsePayload::Ready));

    // stderr only: stdout carries the protocol.
    eprintln!("sentinelgov agent mode v{PROTOCOL_VERSION} ready, waiting for commands on stdin");

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("stdin read error: {e}");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let cmd: AgentCommand = match serde_json::from_str(&line) {
            Ok(c) => c,
            Err(e) => {
                emit(
                    &mut stdout,
                    &make_response(ResponsePayload::Error {
                        message: format!("Parse error: {e}"),
                    }),
                );
                continue;
            }
        };

        let response = process_command(cmd, &mut app);
        let is_goodbye = matches!(response.payload, ResponsePayload::Goodbye);
        emit(&mut stdout, &response);

        if is_goodbye {
            break;
        }
    }

    eprintln!("sentinelgov agent mode shutting down");
}

fn emit(out: &mut impl Write, response: &AgentResponse) {
    match serde_json::to_string(response) {
        Ok(line) => {
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
        Err(e) => eprintln!("failed to serialize response: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

fn process_command(cmd: AgentCommand, app: &mut App) -> AgentResponse {
    match cmd {
        AgentCommand::InjectCrisis => {
            app.world_mut().send_event(InjectCrisis);
            make_response(ResponsePayload::Ok)
        }

        AgentCommand::Approve { approver } => {
            app.world_mut().send_event(GrantHumanApproval { approver });
            make_response(ResponsePayload::Ok)
        }

        AgentCommand::Abort { reason } => {
            app.world_mut().send_event(AbortCrisis { reason });
            make_response(ResponsePayload::Ok)
        }

        AgentCommand::Telemetry { packet } => {
            app.world_mut().send_event(TelemetryReading(packet));
            make_response(ResponsePayload::Ok)
        }

        AgentCommand::InjectFault { agent, mode } => {
            app.world_mut()
                .resource_mut::<FaultInjection>()
                .inject(agent, mode);
            make_response(ResponsePayload::Ok)
        }

        AgentCommand::Step { ticks } => {
            engine::step(app, ticks.min(MAX_STEP_TICKS));
            make_response(ResponsePayload::StepComplete {
                tick: engine::current_tick(app),
            })
        }

        AgentCommand::Observe { since } => {
            let world = app.world();
            let observation = CrisisObservation::build(
                world.resource::<CrisisRun>(),
                world.resource::<CrisisLedger>(),
                world.resource::<RiskGauge>(),
                engine::current_tick(app),
                since,
            );
            make_response(ResponsePayload::Observation { observation })
        }

        AgentCommand::ExportReport { path, format } => {
            let report = engine::current_report(app);
            match report::export_report(&report, &path, format) {
                Ok(bytes) => make_response(ResponsePayload::ReportWritten {
                    path,
                    bytes: bytes as u64,
                }),
                Err(e) => make_response(ResponsePayload::Error {
                    message: format!("Report export to {path} failed: {e}"),
                }),
            }
        }

        AgentCommand::Quit => make_response(ResponsePayload::Goodbye),
    }
}
