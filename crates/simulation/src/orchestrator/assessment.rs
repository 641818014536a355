//! Parallel assessment: risk assessment, simulation burst and resource audit.
//!
//! Each procedure is a pure function over an owned input snapshot, wrapped in
//! [`run_resilient`] so a failure yields a typed fallback. In parallel mode
//! the three run as tasks on the `AsyncComputeTaskPool` and are polled every
//! tick; nothing is merged back until all three have finished.

use std::collections::BTreeMap;

use bevy::prelude::*;
use bevy::tasks::{block_on, AsyncComputeTaskPool, Task};

use crate::agents::AgentKind;
use crate::bayesian::BayesianEngine;
use crate::crisis_params::CrisisParams;
use crate::error::CrisisError;
use crate::flood_grid::{
    predict_future, step_flood_grid, zone_flood_risks, FloodForecast, FloodGrid, StepInput,
};
use crate::infrastructure_graph::InfrastructureGraph;
use crate::monte_carlo::{run_monte_carlo_with, MonteCarloResult};
use crate::negotiation::ResourceInventory;
use crate::resilience::{run_resilient, Resilient};
use crate::risk_model::{
    calculate_live_risk_with, compute_sensitivity_with, infer_risk_with, InferenceResult,
    SensitivityBreakdown,
};
use crate::telemetry::TelemetryPacket;

use super::resources::FaultMode;

fn injected(agent: AgentKind, fault: Option<FaultMode>) -> Result<(), CrisisError> {
    match fault {
        None => Ok(()),
        Some(FaultMode::Error) => Err(CrisisError::InjectedFault {
            agent: agent.name().to_string(),
        }),
        Some(FaultMode::Panic) => panic!("injected panic in {} agent", agent.name()),
    }
}

// =============================================================================
// Risk assessment
// =============================================================================

#[derive(Debug, Clone)]
pub struct RiskInput {
    pub telemetry: TelemetryPacket,
    pub params: CrisisParams,
    /// Risk estimated at detection; the fallback reports it unchanged.
    pub detection_risk: u32,
    pub fault: Option<FaultMode>,
}

#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub live_risk: u32,
    pub sensitivity: SensitivityBreakdown,
    pub bayes: BayesianEngine,
    pub inference: Option<InferenceResult>,
}

pub fn assess_risk(input: &RiskInput) -> Result<RiskAssessment, CrisisError> {
    injected(AgentKind::Risk, input.fault)?;
    let t = &input.telemetry;
    let p = &input.params;
    let live_risk = calculate_live_risk_with(t, &p.risk);

    let mut bayes = BayesianEngine::new(p.bayes.prior);
    let river_level = p.bayes.river_base_level_m + t.rainfall * p.bayes.river_rise_per_mm;
    bayes.update("rainfall", t.rainfall)?;
    bayes.update("river_level", river_level)?;
    bayes.update("drainage_failure", t.drainage_capacity)?;
    bayes.update("social_spike", t.social_spike)?;
    bayes.update("sensor_alert", live_risk as f64 / 100.0)?;
    bayes.update("historical_frequency", p.bayes.historical_frequency)?;

    Ok(RiskAssessment {
        live_risk,
        sensitivity: compute_sensitivity_with(t, &p.risk),
        bayes,
        inference: Some(infer_risk_with(t, &p.risk)),
    })
}

/// Posterior 0.5 with the widest interval and no inference cross-check.
pub fn risk_fallback(input: &RiskInput) -> RiskAssessment {
    RiskAssessment {
        live_risk: input.detection_risk,
        sensitivity: SensitivityBreakdown::default(),
        bayes: BayesianEngine::new(0.5),
        inference: None,
    }
}

// =============================================================================
// Simulation burst
// =============================================================================

#[derive(Debug, Clone)]
pub struct SimulationInput {
    pub grid: FloodGrid,
    pub graph: InfrastructureGraph,
    pub telemetry: TelemetryPacket,
    pub params: CrisisParams,
    pub fault: Option<FaultMode>,
}

#[derive(Debug, Clone)]
pub struct SimulationBurst {
    pub grid: FloodGrid,
    pub graph: InfrastructureGraph,
    pub zone_flood: BTreeMap<String, f64>,
    pub forecast: Option<FloodForecast>,
    pub monte_carlo: Option<MonteCarloResult>,
    pub newly_flooded: Vec<String>,
    pub newly_blocked: Vec<(String, String)>,
}

pub fn simulate_burst(input: &SimulationInput) -> Result<SimulationBurst, CrisisError> {
    injected(AgentKind::Simulation, input.fault)?;
    let p = &input.params;
    let step_input = StepInput::from_telemetry(&input.telemetry, p);

    let mut grid = input.grid.clone();
    let mut graph = input.graph.clone();
    let mut newly_flooded = Vec::new();
    let mut newly_blocked = Vec::new();
    for _ in 0..p.flood.burst_steps {
        grid = step_flood_grid(&grid, &step_input, 1.0);
        let report =
            graph.simulate_flood_step_with(input.telemetry.rainfall, p.risk.rainfall_cap_mm);
        newly_flooded.extend(report.newly_flooded);
        newly_blocked.extend(report.newly_blocked);
    }

    let forecast = predict_future(
        &grid,
        &step_input,
        p.flood.flood_threshold,
        p.flood.forecast_steps,
    );
    let monte_carlo = run_monte_carlo_with(
        &input.telemetry,
        p.monte_carlo.iterations,
        p.monte_carlo.seed,
        &p.monte_carlo,
        &p.risk,
    );

    Ok(SimulationBurst {
        zone_flood: zone_flood_risks(&grid),
        grid,
        graph,
        forecast: Some(forecast),
        monte_carlo: Some(monte_carlo),
        newly_flooded,
        newly_blocked,
    })
}

/// Twin unchanged, no forecast and no Monte Carlo result.
pub fn simulation_fallback(input: &SimulationInput) -> SimulationBurst {
    SimulationBurst {
        zone_flood: zone_flood_risks(&input.grid),
        grid: input.grid.clone(),
        graph: input.graph.clone(),
        forecast: None,
        monte_carlo: None,
        newly_flooded: Vec::new(),
        newly_blocked: Vec::new(),
    }
}

// =============================================================================
// Resource audit
// =============================================================================

#[derive(Debug, Clone)]
pub struct ResourceInput {
    pub params: CrisisParams,
    pub fault: Option<FaultMode>,
}

pub fn audit_resources(input: &ResourceInput) -> Result<ResourceInventory, CrisisError> {
    injected(AgentKind::Resource, input.fault)?;
    Ok(ResourceInventory::from(&input.params.inventory))
}

// =============================================================================
// Task slots
// =============================================================================

pub type RiskOutcome = Resilient<RiskAssessment>;
pub type SimulationOutcome = Resilient<SimulationBurst>;
pub type ResourceOutcome = Resilient<ResourceInventory>;

pub fn run_risk(input: RiskInput) -> RiskOutcome {
    run_resilient(
        AgentKind::Risk.name(),
        || assess_risk(&input),
        || risk_fallback(&input),
    )
}

pub fn run_simulation(input: SimulationInput) -> SimulationOutcome {
    run_resilient(
        AgentKind::Simulation.name(),
        || simulate_burst(&input),
        || simulation_fallback(&input),
    )
}

pub fn run_resource_audit(input: ResourceInput) -> ResourceOutcome {
    run_resilient(
        AgentKind::Resource.name(),
        || audit_resources(&input),
        ResourceInventory::default,
    )
}

/// One assessment procedure, in flight or finished.
#[derive(Default)]
pub enum Slot<T> {
    #[default]
    Empty,
    Running(Task<T>),
    Ready(T),
}

impl<T> Slot<T> {
    fn poll(&mut self) {
        if let Slot::Running(task) = self {
            if let Some(value) = block_on(futures_lite::future::poll_once(task)) {
                *self = Slot::Ready(value);
            }
        }
    }

    fn is_ready(&self) -> bool {
        matches!(self, Slot::Ready(_))
    }

    fn take(&mut self) -> Option<T> {
        match std::mem::take(self) {
            Slot::Ready(value) => Some(value),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// The three assessment slots of the current run.
#[derive(Resource, Default)]
pub struct AssessmentTasks {
    pub risk: Slot<RiskOutcome>,
    pub simulation: Slot<SimulationOutcome>,
    pub resource: Slot<ResourceOutcome>,
}

/// Joined results of all three procedures.
#[derive(Debug)]
pub struct AssessmentResults {
    pub risk: RiskOutcome,
    pub simulation: SimulationOutcome,
    pub resource: ResourceOutcome,
}

impl AssessmentTasks {
    /// Start all three procedures, on the task pool or inline.
    pub fn start(
        &mut self,
        risk: RiskInput,
        simulation: SimulationInput,
        resource: ResourceInput,
        parallel: bool,
    ) {
        if parallel {
            let pool = AsyncComputeTaskPool::get();
            self.risk = Slot::Running(pool.spawn(async move { run_risk(risk) }));
            self.simulation = Slot::Running(pool.spawn(async move { run_simulation(simulation) }));
            self.resource = Slot::Running(pool.spawn(async move { run_resource_audit(resource) }));
        } else {
            self.risk = Slot::Ready(run_risk(risk));
            self.simulation = Slot::Ready(run_simulation(simulation));
            self.resource = Slot::Ready(run_resource_audit(resource));
        }
    }

    /// Poll every running slot; returns the joined results once all three
    /// are finished.
    pub fn join(&mut self) -> Option<AssessmentResults> {
        self.risk.poll();
        self.simulation.poll();
        self.resource.poll();
        if !(self.risk.is_ready() && self.simulation.is_ready() && self.resource.is_ready()) {
            return None;
        }
        Some(AssessmentResults {
            risk: self.risk.take()?,
            simulation: self.simulation.take()?,
            resource: self.resource.take()?,
        })
    }

    pub fn in_flight(&self) -> bool {
        !matches!(
            (&self.risk, &self.simulation, &self.resource),
            (Slot::Empty, Slot::Empty, Slot::Empty)
        )
    }

    /// Drop every slot; running tasks are cancelled.
    pub fn cancel(&mut self) {
        *self = Self::default();
    }
}
