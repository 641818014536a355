use std::collections::BTreeMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agents::{AgentKind, AgentRoster};
use crate::audit::{AuditEntry, AuditTrail, Severity};
use crate::bayesian::BayesianEngine;
use crate::chain_hash::DecisionChain;
use crate::crisis_params::CrisisParams;
use crate::crisis_state::{CrisisStatus, StatusMachine};
use crate::error::CrisisError;
use crate::event_bus::{EventBus, WaitHandle};
use crate::event_store::{kinds, EventStore};
use crate::feed::{CrisisFeed, FeedKind, LogLevel};
use crate::flood_grid::{build_flood_grid, FloodForecast, FloodGrid};
use crate::infrastructure_graph::InfrastructureGraph;
use crate::monte_carlo::MonteCarloResult;
use crate::negotiation::{NegotiationResult, ResourceInventory};
use crate::risk_model::{InferenceResult, SensitivityBreakdown};
use crate::zones::{ZoneBoard, ZoneChange};

use super::planning::MitigationPlan;

/// Source name for entries the orchestrator itself writes.
pub const ORCHESTRATOR: &str = "Orchestrator";

// =============================================================================
// Phases and stages
// =============================================================================

/// The seven named phases of a crisis run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Detection,
    ParallelAssessment,
    ResponsePlanning,
    Negotiation,
    GovernanceApproval,
    Execution,
    Resolution,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Detection,
        Phase::ParallelAssessment,
        Phase::ResponsePlanning,
        Phase::Negotiation,
        Phase::GovernanceApproval,
        Phase::Execution,
        Phase::Resolution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Detection => "detection",
            Phase::ParallelAssessment => "parallel_assessment",
            Phase::ResponsePlanning => "response_planning",
            Phase::Negotiation => "negotiation",
            Phase::GovernanceApproval => "governance_approval",
            Phase::Execution => "execution",
            Phase::Resolution => "resolution",
        }
    }
}

/// Where the phase driver is within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStage {
    #[default]
    Idle,
    Detection,
    Assessment,
    AwaitingAssessment,
    ResponsePlanning,
    Negotiation,
    Governance,
    AwaitingApproval {
        wait: WaitHandle,
    },
    Execution {
        step: u32,
    },
    Resolution,
    Complete,
}

impl RunStage {
    /// Stages that only advance on an outside completion (tasks, approval).
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            RunStage::AwaitingAssessment | RunStage::AwaitingApproval { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Resolved,
    Aborted { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub initial_risk: f64,
    pub peak_risk: f64,
    pub current_risk: f64,
    pub final_risk: f64,
    pub risk_reduction: f64,
    /// Percentage of peak risk removed by the response.
    pub damage_prevented: f64,
}

impl RunMetrics {
    pub fn observe(&mut self, risk: f64) {
        self.current_risk = risk;
        self.peak_risk = self.peak_risk.max(risk);
    }

    pub fn resolve(&mut self, final_risk: f64) {
        self.final_risk = final_risk;
        self.risk_reduction = (self.peak_risk - final_risk).max(0.0);
        self.damage_prevented = if self.peak_risk > 0.0 {
            (self.risk_reduction / self.peak_risk * 100.0).round()
        } else {
            0.0
        };
    }
}

// =============================================================================
// CrisisRun
// =============================================================================

/// Run-scoped crisis state owned by the orchestrator.
#[derive(Resource, Debug, Clone, Default)]
pub struct CrisisRun {
    pub status: StatusMachine,
    pub stage: RunStage,
    /// Tick at which the current stage may act.
    pub ready_at: u64,
    /// Number of runs started so far; the current run's id.
    pub run_id: u32,
    pub started_at: u64,
    pub phases: Vec<Phase>,
    pub zones: ZoneBoard,
    /// Zones the Sentinel flagged; the plan and the demand cover these.
    pub affected_zones: Vec<String>,
    pub bayes: BayesianEngine,
    pub sensitivity: Option<SensitivityBreakdown>,
    pub inference: Option<InferenceResult>,
    pub inventory: ResourceInventory,
    pub monte_carlo: Option<MonteCarloResult>,
    pub forecast: Option<FloodForecast>,
    pub plan: Option<MitigationPlan>,
    pub negotiation: Option<NegotiationResult>,
    pub approver: Option<String>,
    pub metrics: RunMetrics,
    pub agents: AgentRoster,
    /// The continuous flood loop runs between assessment and resolution.
    pub continuous_active: bool,
    pub last_sample: Option<f64>,
    pub interrupt_fired: bool,
    pub outcome: Option<RunOutcome>,
}

impl CrisisRun {
    pub fn status(&self) -> CrisisStatus {
        self.status.status()
    }

    /// True from injection until the run resolves or is aborted.
    pub fn in_progress(&self) -> bool {
        !matches!(self.stage, RunStage::Idle | RunStage::Complete)
    }

    pub fn completed_phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Clear everything scoped to a single run, keeping the run counter and
    /// the status machine.
    pub fn begin(&mut self, params: &CrisisParams, tick: u64) {
        let status = std::mem::take(&mut self.status);
        let run_id = self.run_id + 1;
        *self = Self {
            status,
            run_id,
            started_at: tick,
            bayes: BayesianEngine::new(params.bayes.prior),
            inventory: ResourceInventory::from(&params.inventory),
            ..Self::default()
        };
    }

    pub fn enter(&mut self, stage: RunStage, tick: u64, delay: u64) {
        self.stage = stage;
        self.ready_at = tick + delay;
    }
}

// =============================================================================
// DigitalTwin
// =============================================================================

/// Flood grid plus infrastructure graph.
#[derive(Resource, Debug, Clone)]
pub struct DigitalTwin {
    pub grid: FloodGrid,
    pub graph: InfrastructureGraph,
    pub zone_flood: BTreeMap<String, f64>,
    pub steps: u64,
    /// Set while the simulation burst works on a snapshot; the continuous
    /// loop leaves the twin alone until the burst is merged back.
    pub checked_out: bool,
}

impl DigitalTwin {
    pub fn from_params(params: &CrisisParams) -> Self {
        Self {
            grid: build_flood_grid(&params.flood),
            graph: InfrastructureGraph::new(params.graph.clone()),
            zone_flood: BTreeMap::new(),
            steps: 0,
            checked_out: false,
        }
    }

    pub fn reset(&mut self, params: &CrisisParams) {
        *self = Self::from_params(params);
    }
}

impl Default for DigitalTwin {
    fn default() -> Self {
        Self::from_params(&CrisisParams::default())
    }
}

// =============================================================================
// CrisisLedger
// =============================================================================

/// Event store, bus, outbound feed and audit trail.
///
/// Every state change goes through one of the helpers here so it lands in the
/// event store and the feed together.
#[derive(Resource, Debug, Default)]
pub struct CrisisLedger {
    pub store: EventStore,
    pub bus: EventBus,
    pub feed: CrisisFeed,
    pub audit: AuditTrail,
    pub chain: DecisionChain,
}

impl CrisisLedger {
    /// Feed log line mirrored to the tracing log.
    pub fn log(
        &mut self,
        tick: u64,
        agent: impl AsRef<str>,
        level: LogLevel,
        message: impl Into<String>,
    ) {
        let agent = agent.as_ref();
        let message = message.into();
        match level {
            LogLevel::Info | LogLevel::Success => info!("[{agent}] {message}"),
            LogLevel::Warning => warn!("[{agent}] {message}"),
            LogLevel::Error => error!("[{agent}] {message}"),
        }
        self.feed.log(tick, agent, level, message);
    }

    pub fn record(
        &mut self,
        tick: u64,
        event_type: &str,
        source: &str,
        payload: serde_json::Value,
    ) {
        self.store.append(event_type, source, payload, tick);
    }

    /// Apply a status change through the adjacency table. Rejections are
    /// recorded and leave the status unchanged.
    pub fn change_status(
        &mut self,
        machine: &mut StatusMachine,
        to: CrisisStatus,
        tick: u64,
    ) -> bool {
        match machine.transition(to) {
            Ok(from) => {
                self.record(
                    tick,
                    kinds::STATUS_CHANGED,
                    ORCHESTRATOR,
                    json!({ "from": from, "to": to }),
                );
                self.feed.push(tick, FeedKind::Status { from, to });
                true
            }
            Err(CrisisError::InvalidTransition { from, to }) => {
                self.record(
                    tick,
                    kinds::TRANSITION_REJECTED,
                    ORCHESTRATOR,
                    json!({ "from": from, "to": to }),
                );
                self.log(
                    tick,
                    ORCHESTRATOR,
                    LogLevel::Warning,
                    format!("Rejected status transition {from} -> {to}"),
                );
                false
            }
            Err(other) => {
                error!("status change failed: {other}");
                false
            }
        }
    }

    /// Forced reset to idle on abort; outside the adjacency table.
    pub fn force_idle(&mut self, machine: &mut StatusMachine, tick: u64) {
        let from = machine.force_idle();
        self.record(
            tick,
            kinds::STATUS_CHANGED,
            ORCHESTRATOR,
            json!({ "from": from, "to": CrisisStatus::Idle, "forced": true }),
        );
        self.feed.push(
            tick,
            FeedKind::Status {
                from,
                to: CrisisStatus::Idle,
            },
        );
    }

    pub fn phase(&mut self, tick: u64, phase: Phase) {
        self.record(
            tick,
            kinds::PHASE_ENTERED,
            ORCHESTRATOR,
            json!({ "phase": phase }),
        );
    }

    pub fn zone(&mut self, tick: u64, change: Option<ZoneChange>) {
        let Some(change) = change else {
            return;
        };
        self.record(
            tick,
            kinds::ZONE_UPDATED,
            ORCHESTRATOR,
            json!({ "zone": change.zone, "status": change.status, "risk": change.risk }),
        );
        self.feed.push(
            tick,
            FeedKind::Zone {
                zone: change.zone,
                status: change.status,
                risk: change.risk,
            },
        );
    }

    pub fn metric(&mut self, tick: u64, name: &str, value: f64) {
        self.record(
            tick,
            kinds::METRIC_UPDATED,
            ORCHESTRATOR,
            json!({ "name": name, "value": value }),
        );
        self.feed.metric(tick, name, value);
    }

    fn audit_appended(&mut self, entry: &AuditEntry) {
        self.record(
            entry.tick,
            kinds::AUDIT_APPENDED,
            &entry.actor,
            json!({
                "seq": entry.seq,
                "action": entry.action,
                "severity": entry.severity,
                "hash": entry.hash,
                "previous_hash": entry.previous_hash,
            }),
        );
        self.feed.push(
            entry.tick,
            FeedKind::Audit {
                entry: entry.clone(),
            },
        );
    }

    pub fn audit(
        &mut self,
        tick: u64,
        actor: impl AsRef<str>,
        action: &str,
        detail: &str,
        severity: Severity,
    ) -> AuditEntry {
        let entry = self
            .audit
            .record(tick, actor.as_ref(), action, detail, severity);
        self.audit_appended(&entry);
        entry
    }

    /// Chain-hash a governance decision and append it to the trail.
    pub fn decision(
        &mut self,
        tick: u64,
        actor: impl AsRef<str>,
        action: &str,
        detail: &str,
        severity: Severity,
    ) -> Result<AuditEntry, CrisisError> {
        let entry = self.audit.record_decision(
            &mut self.chain,
            tick,
            actor.as_ref(),
            action,
            detail,
            severity,
        )?;
        self.audit_appended(&entry);
        Ok(entry)
    }

    /// Publish on the bus; handler failures are logged, never propagated.
    pub fn emit(
        &mut self,
        tick: u64,
        topic: &str,
        source: impl AsRef<str>,
        payload: serde_json::Value,
    ) {
        let source = source.as_ref();
        let report = self.bus.emit(topic, source, payload, tick);
        for failure in report.failures {
            self.log(
                tick,
                source,
                LogLevel::Warning,
                format!(
                    "Subscriber {} failed on {topic}: {}",
                    failure.subscriber, failure.message
                ),
            );
        }
    }

    /// Run-scoped audit state goes back to genesis; the store, feed and bus
    /// subscriptions persist across runs.
    pub fn begin_run(&mut self) {
        self.audit.clear();
        self.chain.reset();
    }
}

// =============================================================================
// FaultInjection / RiskGauge
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultMode {
    /// The procedure returns an error.
    Error,
    /// The procedure panics.
    Panic,
}

/// Faults to inject into the assessment procedures (chaos testing).
#[derive(Resource, Debug, Clone, Default)]
pub struct FaultInjection {
    faults: Vec<(AgentKind, FaultMode)>,
}

impl FaultInjection {
    pub fn inject(&mut self, agent: AgentKind, mode: FaultMode) {
        self.faults.retain(|(a, _)| *a != agent);
        self.faults.push((agent, mode));
    }

    pub fn clear(&mut self) {
        self.faults.clear();
    }

    pub fn fault_for(&self, agent: AgentKind) -> Option<FaultMode> {
        self.faults
            .iter()
            .find(|(a, _)| *a == agent)
            .map(|(_, mode)| *mode)
    }
}

/// Displayed risk, eased toward the latest computed value each tick.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskGauge {
    pub displayed: f64,
    pub target: f64,
}

impl RiskGauge {
    pub fn advance(&mut self, step: f64) {
        let delta = self.target - self.displayed;
        if delta.abs() <= step {
            self.displayed = self.target;
        } else {
            self.displayed += step * delta.signum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_hash::ChainVerification;

    #[test]
    fn test_metrics_resolution() {
        let mut m = RunMetrics::default();
        m.observe(18.0);
        m.observe(83.0);
        m.observe(60.0);
        assert_eq!(m.peak_risk, 83.0);
        m.resolve(34.0);
        assert_eq!(m.risk_reduction, 49.0);
        assert_eq!(m.damage_prevented, 59.0);
    }

    #[test]
    fn test_metrics_zero_peak() {
        let mut m = RunMetrics::default();
        m.resolve(0.0);
        assert_eq!(m.damage_prevented, 0.0);
        m.observe(10.0);
        m.resolve(30.0);
        assert_eq!(m.risk_reduction, 0.0);
    }

    #[test]
    fn test_ledger_status_change_and_rejection() {
        let mut ledger = CrisisLedger::default();
        let mut machine = StatusMachine::default();
        assert!(ledger.change_status(&mut machine, CrisisStatus::Detected, 1));
        assert!(!ledger.change_status(&mut machine, CrisisStatus::Resolved, 2));
        assert_eq!(machine.status(), CrisisStatus::Detected);
        assert_eq!(ledger.store.len(), 2);
        assert_eq!(ledger.store.events()[1].event_type(), kinds::TRANSITION_REJECTED);
    }

    #[test]
    fn test_rejected_transition_is_logged_as_warning() {
        let mut ledger = CrisisLedger::default();
        let mut machine = StatusMachine::default();
        assert!(!ledger.change_status(&mut machine, CrisisStatus::Mitigating, 4));

        let warning = ledger.feed.records().iter().find_map(|r| match &r.kind {
            FeedKind::Log { agent, level, message } if agent == ORCHESTRATOR => {
                Some((*level, message.clone()))
            }
            _ => None,
        });
        assert_eq!(
            warning,
            Some((LogLevel::Warning, "Rejected status transition idle -> mitigating".to_string()))
        );
        assert_eq!(machine.rejected_count(), 1);
    }

    #[test]
    fn test_ledger_decisions_are_chained() {
        let mut ledger = CrisisLedger::default();
        ledger.audit(1, AgentKind::Sentinel, "anomaly_detected", "zone-1", Severity::Warning);
        ledger
            .decision(2, AgentKind::Governance, "approved", "auto", Severity::Info)
            .expect("hashable");
        ledger
            .decision(3, AgentKind::Governance, "resolved", "done", Severity::Info)
            .expect("hashable");
        assert_eq!(ledger.audit.chained().count(), 2);
        assert_eq!(ledger.audit.verify_chain(), ChainVerification::Valid);
        assert_eq!(ledger.feed.records().len(), 3);
        ledger.begin_run();
        assert!(ledger.audit.is_empty());
        assert_eq!(ledger.store.len(), 3);
    }

    #[test]
    fn test_gauge_eases_toward_target() {
        let mut gauge = RiskGauge {
            displayed: 18.0,
            target: 30.0,
        };
        gauge.advance(4.0);
        assert_eq!(gauge.displayed, 22.0);
        for _ in 0..5 {
            gauge.advance(4.0);
        }
        assert_eq!(gauge.displayed, 30.0);
        gauge.target = 10.0;
        gauge.advance(4.0);
        assert_eq!(gauge.displayed, 26.0);
    }

    #[test]
    fn test_fault_injection_replaces_mode() {
        let mut faults = FaultInjection::default();
        faults.inject(AgentKind::Risk, FaultMode::Error);
        faults.inject(AgentKind::Risk, FaultMode::Panic);
        assert_eq!(faults.fault_for(AgentKind::Risk), Some(FaultMode::Panic));
        assert_eq!(faults.fault_for(AgentKind::Resource), None);
    }
}
