//! Crisis orchestrator.
//!
//! One crisis run walks the seven phases in order:
//!
//! ```text
//! Detection → ParallelAssessment → ResponsePlanning → Negotiation
//!           → GovernanceApproval → Execution → Resolution
//! ```
//!
//! The Risk, Simulation and Resource assessments run concurrently on the
//! async compute pool and are joined before planning starts. A failing or
//! panicking assessment is replaced by its fallback and the run continues.
//! With human-in-the-loop governance the run suspends on an event-bus wait
//! until an operator approves or the wait times out.
//!
//! All run state lives in resources ([`CrisisRun`], [`DigitalTwin`],
//! [`CrisisLedger`]); systems mutate it only through the helpers in
//! [`phases`] so every change lands in the event store and the feed.

mod assessment;
mod continuous;
mod events;
mod ingest;
mod phases;
mod planning;
mod resources;

pub use assessment::{
    assess_risk, audit_resources, simulate_burst, AssessmentResults, AssessmentTasks,
    ResourceInput, RiskAssessment, RiskInput, SimulationBurst, SimulationInput,
};
pub use continuous::{advance_risk_gauge, continuous_step, run_continuous_loop, LoopSample};
pub use events::{
    AbortCrisis, ExportReport, GrantHumanApproval, InjectCrisis, ReportFormat, TelemetryReading,
};
pub use ingest::{handle_control_signals, ingest_telemetry, OPERATOR};
pub use phases::{drive_crisis_run, zone_status_for, RunCtx};
pub use planning::{build_plan, initial_demand, plan_confidence, MitigationPlan};
pub use resources::{
    CrisisLedger, CrisisRun, DigitalTwin, FaultInjection, FaultMode, Phase, RiskGauge,
    RunMetrics, RunOutcome, RunStage, ORCHESTRATOR,
};

use bevy::prelude::*;

use crate::crisis_params::CrisisParams;
use crate::simulation_sets::CrisisSet;
use crate::telemetry::{SyntheticTelemetry, TelemetryFeed};

pub struct OrchestratorPlugin;

impl Plugin for OrchestratorPlugin {
    fn build(&self, app: &mut App) {
        let params = app
            .world()
            .get_resource::<CrisisParams>()
            .cloned()
            .unwrap_or_default();
        app.insert_resource(DigitalTwin::from_params(&params))
            .insert_resource(SyntheticTelemetry::from_params(&params.telemetry))
            .init_resource::<CrisisRun>()
            .init_resource::<CrisisLedger>()
            .init_resource::<AssessmentTasks>()
            .init_resource::<TelemetryFeed>()
            .init_resource::<FaultInjection>()
            .init_resource::<RiskGauge>()
            .add_event::<InjectCrisis>()
            .add_event::<GrantHumanApproval>()
            .add_event::<AbortCrisis>()
            .add_event::<TelemetryReading>()
            .add_event::<ExportReport>()
            .add_systems(
                FixedUpdate,
                (handle_control_signals, ingest_telemetry)
                    .chain()
                    .in_set(CrisisSet::Ingest),
            )
            .add_systems(FixedUpdate, drive_crisis_run.in_set(CrisisSet::Orchestrate))
            .add_systems(FixedUpdate, run_continuous_loop.in_set(CrisisSet::Simulate))
            .add_systems(FixedUpdate, advance_risk_gauge.in_set(CrisisSet::Present));
    }
}
