//! Control protocol types for the `--agent` headless mode.
//!
//! External programs (operator consoles, scripts, test harnesses) drive the
//! engine with newline-delimited JSON on stdin and read responses on stdout.
//!
//! These types live in the `simulation` crate so they can be unit-tested
//! without pulling in the app binary. The I/O loop lives in
//! `crates/app/src/agent_mode.rs`.

use serde::{Deserialize, Serialize};

use crate::agents::AgentKind;
use crate::crisis_state::CrisisStatus;
use crate::feed::FeedRecord;
use crate::orchestrator::{CrisisLedger, CrisisRun, FaultMode, ReportFormat, RiskGauge, RunStage};
use crate::telemetry::TelemetryPacket;
use crate::zones::Zone;

// ---------------------------------------------------------------------------
// Commands (stdin → engine)
// ---------------------------------------------------------------------------

/// One command per stdin line, discriminated by `cmd`.
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd")]
pub enum AgentCommand {
    /// Start a crisis run.
    #[serde(rename = "inject_crisis")]
    InjectCrisis,

    /// Approve the pending plan.
    #[serde(rename = "approve")]
    Approve { approver: String },

    /// Abort the run in progress.
    #[serde(rename = "abort")]
    Abort { reason: String },

    /// Feed an external telemetry packet.
    #[serde(rename = "telemetry")]
    Telemetry { packet: TelemetryPacket },

    /// Make an assessment procedure fail on the next run.
    #[serde(rename = "inject_fault")]
    InjectFault { agent: AgentKind, mode: FaultMode },

    /// Advance the engine by `ticks` fixed-update ticks.
    #[serde(rename = "step")]
    Step { ticks: u64 },

    /// Status plus every feed record after `since`.
    #[serde(rename = "observe")]
    Observe {
        #[serde(default)]
        since: u64,
    },

    /// Write the current run's report.
    #[serde(rename = "export_report")]
    ExportReport {
        path: String,
        #[serde(default)]
        format: ReportFormat,
    },

    /// End the session.
    #[serde(rename = "quit")]
    Quit,
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CrisisObservation {
    pub tick: u64,
    pub run_id: u32,
    pub status: CrisisStatus,
    pub awaiting_approval: bool,
    pub current_risk: f64,
    /// Eased gauge value.
    pub displayed_risk: f64,
    pub active_agents: Vec<AgentKind>,
    pub zones: Vec<Zone>,
    /// Cursor to pass as `since` on the next observe.
    pub cursor: u64,
    pub records: Vec<FeedRecord>,
}

impl CrisisObservation {
    pub fn build(
        run: &CrisisRun,
        ledger: &CrisisLedger,
        gauge: &RiskGauge,
        tick: u64,
        since: u64,
    ) -> Self {
        Self {
            tick,
            run_id: run.run_id,
            status: run.status(),
            awaiting_approval: matches!(run.stage, RunStage::AwaitingApproval { .. }),
            current_risk: run.metrics.current_risk,
            displayed_risk: gauge.displayed,
            active_agents: run
                .agents
                .iter()
                .filter(|(_, state)| state.active)
                .map(|(kind, _)| kind)
                .collect(),
            zones: run.zones.zones().to_vec(),
            cursor: ledger.feed.last_seq(),
            records: ledger.feed.records_since(since).to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses (engine → stdout)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    /// Bumped when the command/response schema changes.
    pub protocol_version: u32,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ResponsePayload {
    #[serde(rename = "ready")]
    Ready,

    #[serde(rename = "observation")]
    Observation { observation: CrisisObservation },

    /// The engine advanced; reports the tick counter.
    #[serde(rename = "step_complete")]
    StepComplete { tick: u64 },

    #[serde(rename = "report_written")]
    ReportWritten { path: String, bytes: u64 },

    /// Generic acknowledgement.
    #[serde(rename = "ok")]
    Ok,

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "goodbye")]
    Goodbye,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub const PROTOCOL_VERSION: u32 = 1;

pub fn make_response(payload: ResponsePayload) -> AgentResponse {
    AgentResponse {
        protocol_version: PROTOCOL_VERSION,
        payload,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
