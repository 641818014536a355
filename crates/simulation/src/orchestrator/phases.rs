//! Phase driver.
//!
//! Each stage acts once its `ready_at` tick has come, then hands over to the
//! next stage. Waiting stages (assessment join, human approval) return
//! without progress until their completion arrives, so the rest of the
//! schedule keeps running while a run is suspended.

use bevy::prelude::*;
use serde_json::json;

use crate::agents::AgentKind;
use crate::audit::Severity;
use crate::crisis_params::CrisisParams;
use crate::crisis_state::CrisisStatus;
use crate::event_bus::{topics, WaitHandle, WaitStatus};
use crate::event_store::kinds;
use crate::feed::{FeedKind, LogLevel};
use crate::negotiation::{run_dynamic_negotiation, NegotiationOutcome};
use crate::risk_model::calculate_live_risk_with;
use crate::telemetry::{SyntheticTelemetry, TelemetryFeed, TelemetryPacket, TelemetryProfile};
use crate::zones::{zone_spec, ZoneStatus, CITY_ZONES};
use crate::TickCounter;

use super::assessment::{
    AssessmentResults, AssessmentTasks, ResourceInput, RiskInput, SimulationInput,
};
use super::planning::{build_plan, initial_demand};
use super::resources::{
    CrisisLedger, CrisisRun, DigitalTwin, FaultInjection, Phase, RiskGauge, RunOutcome, RunStage,
    ORCHESTRATOR,
};

/// Upper bound on stage hand-overs within one tick.
const MAX_STAGES_PER_TICK: usize = 16;

/// Mutable view over everything a stage touches.
pub struct RunCtx<'a> {
    pub run: &'a mut CrisisRun,
    pub twin: &'a mut DigitalTwin,
    pub ledger: &'a mut CrisisLedger,
    pub tasks: &'a mut AssessmentTasks,
    pub synthetic: &'a mut SyntheticTelemetry,
    pub gauge: &'a mut RiskGauge,
    pub params: &'a CrisisParams,
    pub faults: &'a FaultInjection,
    pub telemetry: TelemetryPacket,
    pub tick: u64,
}

pub fn zone_status_for(risk: f64) -> ZoneStatus {
    if risk >= 75.0 {
        ZoneStatus::Critical
    } else if risk >= 50.0 {
        ZoneStatus::Warning
    } else {
        ZoneStatus::Normal
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl RunCtx<'_> {
    fn delay(&self) -> u64 {
        self.params.pacing.phase_delay_ticks
    }

    fn live_risk(&self) -> f64 {
        calculate_live_risk_with(&self.telemetry, &self.params.risk) as f64
    }

    fn set_status(&mut self, to: CrisisStatus) -> bool {
        self.ledger.change_status(&mut self.run.status, to, self.tick)
    }

    fn enter_phase(&mut self, phase: Phase) {
        self.run.phases.push(phase);
        self.ledger.phase(self.tick, phase);
    }

    fn observe_risk(&mut self, risk: f64) {
        self.run.metrics.observe(risk);
        self.ledger.metric(self.tick, "risk", risk);
        self.gauge.target = risk;
    }

    fn log(&mut self, agent: impl AsRef<str>, level: LogLevel, message: impl Into<String>) {
        self.ledger.log(self.tick, agent, level, message);
    }

    // -------------------------------------------------------------------------
    // Control signals
    // -------------------------------------------------------------------------

    /// Start a fresh run. The caller checks that none is in progress.
    pub fn start_run(&mut self) {
        let tick = self.tick;
        if self.run.status() == CrisisStatus::Resolved {
            self.set_status(CrisisStatus::Idle);
        }
        self.run.begin(self.params, tick);
        self.twin.reset(self.params);
        self.tasks.cancel();
        self.ledger.begin_run();

        let run_id = self.run.run_id;
        self.ledger
            .record(tick, kinds::CRISIS_STARTED, ORCHESTRATOR, json!({ "run_id": run_id }));
        self.ledger.emit(
            tick,
            topics::CRISIS_STARTED,
            ORCHESTRATOR,
            json!({ "run_id": run_id }),
        );
        self.log(
            ORCHESTRATOR,
            LogLevel::Warning,
            format!("Crisis #{run_id} injected: storm front approaching the river basin"),
        );
        self.synthetic.set_profile(TelemetryProfile::Storm);
        let delay = self.delay();
        self.run.enter(RunStage::Detection, tick, delay);
    }

    /// Forced deactivation. Not a table transition: the status is reset to
    /// idle directly.
    pub fn abort_run(&mut self, reason: &str, approval_timed_out: bool) {
        let tick = self.tick;
        if let RunStage::AwaitingApproval { wait } = self.run.stage {
            self.ledger.bus.cancel_wait(wait);
        }
        self.tasks.cancel();
        self.twin.checked_out = false;

        if approval_timed_out {
            if let Err(e) = self.ledger.decision(
                tick,
                AgentKind::Governance,
                "approval_rejected",
                reason,
                Severity::Critical,
            ) {
                self.log(
                    AgentKind::Governance,
                    LogLevel::Error,
                    format!("Could not chain rejection: {e}"),
                );
            }
        }
        self.ledger
            .audit(tick, ORCHESTRATOR, "crisis_aborted", reason, Severity::Critical);
        self.ledger.record(
            tick,
            kinds::CRISIS_ABORTED,
            ORCHESTRATOR,
            json!({ "reason": reason, "status": self.run.status() }),
        );
        self.ledger
            .emit(tick, topics::CRISIS_ABORTED, ORCHESTRATOR, json!({ "reason": reason }));
        self.log(ORCHESTRATOR, LogLevel::Error, format!("Crisis aborted: {reason}"));

        self.run.agents.deactivate_all();
        self.run.continuous_active = false;
        self.synthetic.set_profile(TelemetryProfile::Nominal);
        self.ledger.force_idle(&mut self.run.status, tick);
        self.run.outcome = Some(RunOutcome::Aborted {
            reason: reason.to_string(),
        });
        self.run.enter(RunStage::Complete, tick, 0);
    }

    // -------------------------------------------------------------------------
    // Stages
    // -------------------------------------------------------------------------

    /// Act on the current stage. Returns `true` if the stage changed.
    pub fn advance(&mut self) -> bool {
        if self.tick < self.run.ready_at {
            return false;
        }
        match self.run.stage {
            RunStage::Idle | RunStage::Complete => return false,
            RunStage::Detection => self.detect(),
            RunStage::Assessment => self.start_assessment(),
            RunStage::AwaitingAssessment => {
                let Some(results) = self.tasks.join() else {
                    return false;
                };
                self.merge_assessment(results);
            }
            RunStage::ResponsePlanning => self.plan_response(),
            RunStage::Negotiation => self.negotiate(),
            RunStage::Governance => self.govern(),
            RunStage::AwaitingApproval { wait } => return self.await_approval(wait),
            RunStage::Execution { step } => self.execute(step),
            RunStage::Resolution => self.resolve(),
        }
        true
    }

    fn detect(&mut self) {
        let tick = self.tick;
        self.set_status(CrisisStatus::Detected);
        self.enter_phase(Phase::Detection);
        self.run
            .agents
            .activate(AgentKind::Sentinel, "scanning sensor network");
        self.log(
            AgentKind::Sentinel,
            LogLevel::Info,
            "Scanning river gauges, drainage sensors and social feeds",
        );

        let risk = self.live_risk();
        let affected = self.run.zones.riskiest(self.params.negotiation.demand_zone_count);
        for id in &affected {
            let baseline = zone_spec(id).map_or(0.0, |z| z.baseline_risk);
            let zone_risk = round1((baseline + risk * 0.5).min(100.0));
            let status = if zone_risk >= 75.0 {
                ZoneStatus::Critical
            } else {
                ZoneStatus::Warning
            };
            let change = self.run.zones.update(id, status, zone_risk);
            self.ledger.zone(tick, change);
        }
        self.log(
            AgentKind::Sentinel,
            LogLevel::Warning,
            format!("Anomalies detected in {}", affected.join(", ")),
        );
        self.run.metrics.initial_risk = risk;
        self.observe_risk(risk);
        self.ledger.audit(
            tick,
            AgentKind::Sentinel,
            "anomaly_detected",
            &format!("zones={} risk={risk}", affected.join(",")),
            Severity::Warning,
        );
        self.ledger.emit(
            tick,
            topics::CRITICAL_THREAT,
            AgentKind::Sentinel,
            json!({ "zones": affected, "risk": risk }),
        );
        self.run.affected_zones = affected;
        let delay = self.delay();
        self.run.enter(RunStage::Assessment, tick, delay);
    }

    fn start_assessment(&mut self) {
        let tick = self.tick;
        self.set_status(CrisisStatus::Simulating);
        self.enter_phase(Phase::ParallelAssessment);
        self.run
            .agents
            .activate(AgentKind::Risk, "bayesian assessment");
        self.run
            .agents
            .activate(AgentKind::Simulation, "flood simulation burst");
        self.run
            .agents
            .activate(AgentKind::Resource, "inventory audit");
        self.log(
            ORCHESTRATOR,
            LogLevel::Info,
            "Risk, Simulation and Resource agents assessing in parallel",
        );

        let risk = RiskInput {
            telemetry: self.telemetry,
            params: self.params.clone(),
            detection_risk: self.run.metrics.initial_risk as u32,
            fault: self.faults.fault_for(AgentKind::Risk),
        };
        let simulation = SimulationInput {
            grid: self.twin.grid.clone(),
            graph: self.twin.graph.clone(),
            telemetry: self.telemetry,
            params: self.params.clone(),
            fault: self.faults.fault_for(AgentKind::Simulation),
        };
        let resource = ResourceInput {
            params: self.params.clone(),
            fault: self.faults.fault_for(AgentKind::Resource),
        };
        self.twin.checked_out = true;
        self.tasks.start(
            risk,
            simulation,
            resource,
            self.params.execution.parallel_assessment,
        );
        self.run.continuous_active = self.params.continuous.enabled;
        self.run.enter(RunStage::AwaitingAssessment, tick, 0);
    }

    fn merge_assessment(&mut self, results: AssessmentResults) {
        let tick = self.tick;
        let failures = [
            (AgentKind::Risk, &results.risk.failure),
            (AgentKind::Simulation, &results.simulation.failure),
            (AgentKind::Resource, &results.resource.failure),
        ];
        for (agent, failure) in failures {
            let Some(failure) = failure else {
                continue;
            };
            self.log(
                agent,
                LogLevel::Error,
                format!("{} agent failed, using fallback: {}", agent.name(), failure.message),
            );
            self.ledger.record(
                tick,
                kinds::AGENT_FAILED,
                agent.name(),
                json!({ "message": failure.message, "panicked": failure.panicked }),
            );
            self.ledger
                .audit(tick, agent, "agent_failed", &failure.message, Severity::Critical);
            self.ledger.emit(
                tick,
                topics::MITIGATION_FAILED,
                agent,
                json!({ "agent": agent.name(), "message": failure.message }),
            );
        }

        // Risk
        let risk = results.risk.value;
        let live = risk.live_risk as f64;
        self.observe_risk(live);
        let state = risk.bayes.state();
        let (posterior, ci, updates) =
            (state.posterior, state.confidence_interval, state.update_count);
        self.ledger.metric(tick, "posterior", posterior);
        self.log(
            AgentKind::Risk,
            LogLevel::Info,
            format!(
                "Posterior flood probability {posterior:.2} (CI {:.2}-{:.2}) after {updates} updates",
                ci[0], ci[1]
            ),
        );
        if let Some(inference) = &risk.inference {
            self.log(
                AgentKind::Risk,
                LogLevel::Info,
                format!(
                    "Inference cross-check ({}): {:.1} [{:.1}, {:.1}]",
                    inference.model_used,
                    inference.predicted_risk,
                    inference.confidence_low,
                    inference.confidence_high
                ),
            );
        }
        let s = risk.sensitivity;
        self.log(
            AgentKind::Risk,
            LogLevel::Info,
            format!(
                "Risk drivers: rainfall {}%, drainage {}%, population {}%, social {}%",
                s.rainfall, s.drainage, s.population, s.social
            ),
        );
        self.run.sensitivity = Some(risk.sensitivity);
        self.run.inference = risk.inference;
        self.run.bayes = risk.bayes;

        // Simulation
        let burst = results.simulation.value;
        for node in &burst.newly_flooded {
            self.log(AgentKind::Simulation, LogLevel::Warning, format!("{node} is flooded"));
        }
        for (from, to) in &burst.newly_blocked {
            self.log(
                AgentKind::Simulation,
                LogLevel::Warning,
                format!("Link {from} -> {to} blocked by flood water"),
            );
        }
        if let Some(mc) = &burst.monte_carlo {
            self.ledger.metric(tick, "mc_mean", mc.mean);
            self.ledger.metric(tick, "mc_std_dev", mc.std_dev);
            self.log(
                AgentKind::Simulation,
                LogLevel::Info,
                format!(
                    "Monte Carlo: mean {:.1}, std dev {:.1}, 95% CI [{:.0}, {:.0}], worst case {:.0} over {} scenarios",
                    mc.mean, mc.std_dev, mc.ci95[0], mc.ci95[1], mc.worst_case, mc.scenarios_run
                ),
            );
        }
        if let Some(forecast) = &burst.forecast {
            self.log(
                AgentKind::Simulation,
                LogLevel::Info,
                format!(
                    "Forecast over {} steps: peak water {:.2}, {} cells above threshold, zones at risk: {}",
                    forecast.steps,
                    forecast.peak_water_level,
                    forecast.flooded_cell_count,
                    forecast.affected_zones.join(", ")
                ),
            );
        }
        self.twin.grid = burst.grid;
        self.twin.graph = burst.graph;
        self.twin.zone_flood = burst.zone_flood;
        self.twin.steps += u64::from(self.params.flood.burst_steps);
        self.twin.checked_out = false;
        self.run.monte_carlo = burst.monte_carlo;
        self.run.forecast = burst.forecast;

        for spec in CITY_ZONES.iter() {
            let flood = self.twin.zone_flood.get(spec.id).copied().unwrap_or(0.0);
            let affected = self.run.affected_zones.iter().any(|z| z == spec.id);
            let exposure = if affected { live * 0.5 } else { 0.0 };
            let zone_risk = round1((spec.baseline_risk + flood + exposure).min(100.0));
            let status = match zone_status_for(zone_risk) {
                ZoneStatus::Normal if affected => ZoneStatus::Warning,
                other => other,
            };
            let change = self.run.zones.update(spec.id, status, zone_risk);
            self.ledger.zone(tick, change);
        }

        // Resource
        let inventory = results.resource.value;
        self.log(
            AgentKind::Resource,
            LogLevel::Info,
            format!(
                "Inventory: {} pumps, {} vehicles, {} shelter places, {} medical teams",
                inventory.pump_units,
                inventory.evacuation_vehicles,
                inventory.shelter_capacity,
                inventory.medical_teams
            ),
        );
        self.run.inventory = inventory;

        self.ledger.emit(
            tick,
            topics::ASSESSMENT_COMPLETE,
            ORCHESTRATOR,
            json!({
                "risk": live,
                "posterior": posterior,
                "mc_mean": self.run.monte_carlo.as_ref().map(|mc| mc.mean),
            }),
        );
        let delay = self.delay();
        self.run.enter(RunStage::ResponsePlanning, tick, delay);
    }

    fn plan_response(&mut self) {
        let tick = self.tick;
        self.enter_phase(Phase::ResponsePlanning);
        self.run
            .agents
            .activate(AgentKind::Response, "drafting mitigation plan");

        let affected = self.run.affected_zones.clone();
        let routes = self.twin.graph.find_evacuation_routes(&affected);
        for evac in &routes {
            match &evac.route {
                Some(route) => self.log(
                    AgentKind::Response,
                    LogLevel::Info,
                    format!(
                        "Route for {}: {} ({:.0} min)",
                        evac.zone,
                        route.path.join(" -> "),
                        route.total_cost
                    ),
                ),
                None => self.log(
                    AgentKind::Response,
                    LogLevel::Warning,
                    format!("No route available for {}", evac.zone),
                ),
            }
        }

        let plan = build_plan(
            &affected,
            routes,
            &self.run.inventory,
            self.run.monte_carlo.as_ref(),
            self.run.metrics.current_risk,
        );
        self.log(
            AgentKind::Response,
            LogLevel::Success,
            format!(
                "Plan: {} (confidence {:.0}%, ETA {} min)",
                plan.action,
                plan.confidence * 100.0,
                plan.estimated_time_minutes
            ),
        );
        self.ledger.record(
            tick,
            kinds::PLAN_CREATED,
            AgentKind::Response.name(),
            json!({
                "action": plan.action,
                "zones": plan.zones,
                "confidence": plan.confidence,
                "estimated_time_minutes": plan.estimated_time_minutes,
            }),
        );
        for id in &affected {
            let change = self.run.zones.set_status(id, ZoneStatus::Evacuating);
            self.ledger.zone(tick, change);
        }
        self.ledger
            .audit(tick, AgentKind::Response, "plan_created", &plan.action, Severity::Info);
        self.ledger.emit(
            tick,
            topics::PLAN_READY,
            AgentKind::Response,
            json!({ "action": plan.action, "confidence": plan.confidence }),
        );
        self.run.plan = Some(plan);
        let delay = self.delay();
        self.run.enter(RunStage::Negotiation, tick, delay);
    }

    fn negotiate(&mut self) {
        let tick = self.tick;
        self.set_status(CrisisStatus::Negotiating);
        self.enter_phase(Phase::Negotiation);
        self.run
            .agents
            .activate(AgentKind::Response, "negotiating evacuation demand");
        self.run
            .agents
            .activate(AgentKind::Resource, "checking feasibility");

        let demand = initial_demand(
            &self.run.affected_zones,
            &self.run.zones,
            &self.params.negotiation,
        );
        let result = run_dynamic_negotiation(demand, &self.run.inventory, &self.params.negotiation);
        for entry in &result.transcript {
            self.ledger.feed.push(
                tick,
                FeedKind::Negotiation {
                    round: entry.round,
                    speaker: entry.speaker.clone(),
                    message: entry.message.clone(),
                },
            );
        }
        let accepted = result.accepted_demand.describe();
        match result.outcome {
            NegotiationOutcome::Consensus => {
                self.log(
                    AgentKind::Resource,
                    LogLevel::Success,
                    format!("Consensus after {} rounds: {accepted}", result.rounds),
                );
                self.ledger.audit(
                    tick,
                    AgentKind::Resource,
                    "negotiation_consensus",
                    &accepted,
                    Severity::Info,
                );
            }
            NegotiationOutcome::TimedOut => {
                self.log(
                    AgentKind::Resource,
                    LogLevel::Warning,
                    format!(
                        "Negotiation timed out after {} rounds; accepting last proposal: {accepted}",
                        result.rounds
                    ),
                );
                self.ledger.audit(
                    tick,
                    AgentKind::Resource,
                    "negotiation_timeout",
                    &accepted,
                    Severity::Warning,
                );
            }
        }
        self.ledger.record(
            tick,
            kinds::NEGOTIATION_COMPLETED,
            AgentKind::Resource.name(),
            json!({
                "outcome": result.outcome,
                "rounds": result.rounds,
                "accepted": result.accepted_demand,
            }),
        );
        self.ledger.emit(
            tick,
            topics::NEGOTIATION_COMPLETE,
            AgentKind::Resource,
            json!({ "outcome": result.outcome, "rounds": result.rounds }),
        );
        self.run.negotiation = Some(result);
        let delay = self.delay();
        self.run.enter(RunStage::Governance, tick, delay);
    }

    fn govern(&mut self) {
        let tick = self.tick;
        self.enter_phase(Phase::GovernanceApproval);
        self.run
            .agents
            .activate(AgentKind::Governance, "compliance review");
        self.log(
            AgentKind::Governance,
            LogLevel::Info,
            "Compliance review: evacuation powers confirmed, inventory audited, negotiation on record",
        );
        if self.params.governance.human_in_the_loop {
            let timeout = self.params.governance.approval_timeout_ticks;
            let wait = self.ledger.bus.wait_for(
                topics::HUMAN_APPROVAL_GIVEN,
                ORCHESTRATOR,
                timeout,
                tick,
            );
            self.ledger.audit(
                tick,
                AgentKind::Governance,
                "approval_requested",
                &format!("timeout_ticks={timeout}"),
                Severity::Info,
            );
            self.log(
                AgentKind::Governance,
                LogLevel::Warning,
                format!("Awaiting human approval (times out after {timeout} ticks)"),
            );
            self.run.enter(RunStage::AwaitingApproval { wait }, tick, 0);
        } else {
            self.approve("auto");
        }
    }

    fn await_approval(&mut self, wait: WaitHandle) -> bool {
        match self.ledger.bus.poll_wait(wait, self.tick) {
            WaitStatus::Pending => false,
            WaitStatus::Resolved(event) => {
                let approver = event
                    .payload
                    .get("approver")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("operator")
                    .to_string();
                self.approve(&approver);
                true
            }
            WaitStatus::TimedOut => {
                self.abort_run("human approval timed out", true);
                true
            }
            WaitStatus::Unknown => {
                self.abort_run("approval wait was lost", false);
                true
            }
        }
    }

    fn approve(&mut self, approver: &str) {
        let tick = self.tick;
        let action = self
            .run
            .plan
            .as_ref()
            .map_or_else(String::new, |p| p.action.clone());
        let detail = format!("approver={approver}; plan={action}");
        match self
            .ledger
            .decision(tick, AgentKind::Governance, "approved", &detail, Severity::Info)
        {
            Ok(entry) => self.log(
                AgentKind::Governance,
                LogLevel::Success,
                format!(
                    "Plan approved by {approver}; decision hash {}",
                    entry.hash.unwrap_or_default()
                ),
            ),
            Err(e) => self.log(
                AgentKind::Governance,
                LogLevel::Error,
                format!("Could not chain approval: {e}"),
            ),
        }
        self.run.approver = Some(approver.to_string());
        let delay = self.delay();
        self.run.enter(RunStage::Execution { step: 0 }, tick, delay);
    }

    fn execute(&mut self, step: u32) {
        let tick = self.tick;
        let total = self.params.pacing.execution_steps.max(1);
        if step == 0 {
            self.set_status(CrisisStatus::Mitigating);
            self.enter_phase(Phase::Execution);
            self.run
                .agents
                .activate(AgentKind::Response, "deploying resources");
            self.run
                .agents
                .activate(AgentKind::Resource, "dispatching units");
            let summary = self
                .run
                .negotiation
                .as_ref()
                .map(|n| n.accepted_demand.describe())
                .unwrap_or_default();
            self.log(
                AgentKind::Response,
                LogLevel::Info,
                format!("Deploying: {summary}"),
            );
            self.ledger.audit(
                tick,
                AgentKind::Response,
                "execution_started",
                &summary,
                Severity::Info,
            );
        }

        let done = step + 1;
        self.synthetic.set_profile(TelemetryProfile::Recovery {
            progress: f64::from(done) / f64::from(total),
        });
        let risk = self.live_risk();
        self.observe_risk(risk);
        self.log(
            AgentKind::Response,
            LogLevel::Info,
            format!("Mitigation step {done}/{total}: live risk {risk}"),
        );

        if done >= total {
            let delay = self.delay().max(1);
            self.run.enter(RunStage::Resolution, tick, delay);
        } else {
            let interval = self.params.pacing.execution_interval_ticks;
            self.run
                .enter(RunStage::Execution { step: done }, tick, interval);
        }
    }

    fn resolve(&mut self) {
        let tick = self.tick;
        self.set_status(CrisisStatus::Mitigated);
        self.enter_phase(Phase::Resolution);

        let final_risk = self.live_risk();
        self.observe_risk(final_risk);
        self.run.metrics.resolve(final_risk);
        let m = self.run.metrics;
        self.ledger.metric(tick, "damage_prevented", m.damage_prevented);

        for id in self.run.affected_zones.clone() {
            let risk = self
                .run
                .zones
                .get(&id)
                .map_or(final_risk, |z| z.risk_level.min(final_risk));
            let change = self.run.zones.update(&id, ZoneStatus::Mitigated, risk);
            self.ledger.zone(tick, change);
        }

        let detail = format!(
            "peak={} final={} reduction={} damage_prevented={}%",
            m.peak_risk, m.final_risk, m.risk_reduction, m.damage_prevented
        );
        if let Err(e) = self.ledger.decision(
            tick,
            AgentKind::Governance,
            "resolved",
            &detail,
            Severity::Info,
        ) {
            self.log(
                AgentKind::Governance,
                LogLevel::Error,
                format!("Could not chain resolution: {e}"),
            );
        }
        self.set_status(CrisisStatus::Resolved);
        self.ledger
            .record(tick, kinds::CRISIS_RESOLVED, ORCHESTRATOR, json!(m));
        self.ledger
            .emit(tick, topics::CRISIS_RESOLVED, ORCHESTRATOR, json!(m));
        self.log(
            ORCHESTRATOR,
            LogLevel::Success,
            format!(
                "Crisis resolved: risk {} -> {}, {}% of projected damage prevented",
                m.peak_risk, m.final_risk, m.damage_prevented
            ),
        );

        self.run.agents.deactivate_all();
        self.run.continuous_active = false;
        self.synthetic.set_profile(TelemetryProfile::Nominal);
        self.run.outcome = Some(RunOutcome::Resolved);
        self.run.enter(RunStage::Complete, tick, 0);
    }
}

/// Drive the current run as far as it can go this tick.
#[allow(clippy::too_many_arguments)]
pub fn drive_crisis_run(
    tick: Res<TickCounter>,
    params: Res<CrisisParams>,
    feed: Res<TelemetryFeed>,
    faults: Res<FaultInjection>,
    mut run: ResMut<CrisisRun>,
    mut twin: ResMut<DigitalTwin>,
    mut ledger: ResMut<CrisisLedger>,
    mut tasks: ResMut<AssessmentTasks>,
    mut synthetic: ResMut<SyntheticTelemetry>,
    mut gauge: ResMut<RiskGauge>,
) {
    if !run.in_progress() {
        return;
    }
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
    for _ in 0..MAX_STAGES_PER_TICK {
        if !ctx.advance() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_status_thresholds() {
        assert_eq!(zone_status_for(80.0), ZoneStatus::Critical);
        assert_eq!(zone_status_for(75.0), ZoneStatus::Critical);
        assert_eq!(zone_status_for(60.0), ZoneStatus::Warning);
        assert_eq!(zone_status_for(10.0), ZoneStatus::Normal);
    }

    #[test]
    fn test_inline_run_completes_in_one_context() {
        let params = CrisisParams::immediate();
        let mut run = CrisisRun::default();
        let mut twin = DigitalTwin::from_params(&params);
        let mut ledger = CrisisLedger::default();
        let mut tasks = AssessmentTasks::default();
        let mut synthetic = SyntheticTelemetry::from_params(&params.telemetry);
        let mut gauge = RiskGauge::default();
        let faults = FaultInjection::default();

        for tick in 0..40 {
            let mut ctx = RunCtx {
                run: &mut run,
                twin: &mut twin,
                ledger: &mut ledger,
                tasks: &mut tasks,
                synthetic: &mut synthetic,
                gauge: &mut gauge,
                params: &params,
                faults: &faults,
                telemetry: TelemetryPacket::STORM,
                tick,
            };
            if tick == 0 {
                ctx.start_run();
            }
            for _ in 0..MAX_STAGES_PER_TICK {
                if !ctx.advance() {
                    break;
                }
            }
        }
        assert_eq!(run.status(), CrisisStatus::Resolved);
        assert_eq!(run.completed_phases(), &Phase::ALL);
        assert_eq!(run.outcome, Some(RunOutcome::Resolved));
        // Telemetry never recovered, so nothing was prevented.
        assert_eq!(run.metrics.damage_prevented, 0.0);
        assert_eq!(run.agents.active_count(), 0);
    }
}
