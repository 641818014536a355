use bevy::prelude::*;

pub mod agent_protocol;
pub mod agents;
pub mod audit;
pub mod bayesian;
pub mod chain_hash;
pub mod config;
pub mod crisis_params;
pub mod crisis_state;
pub mod error;
pub mod event_bus;
pub mod event_store;
pub mod feed;
pub mod flood_grid;
pub mod infrastructure_graph;
pub mod monte_carlo;
pub mod negotiation;
pub mod orchestrator;
pub mod projection;
pub mod report;
pub mod resilience;
pub mod risk_model;
pub mod sim_rng;
pub mod simulation_sets;
pub mod telemetry;
pub mod zones;

#[cfg(any(test, feature = "bench"))]
pub mod test_harness;

pub use crisis_params::CrisisParams;
pub use error::CrisisError;
pub use simulation_sets::CrisisSet;

/// Global tick counter incremented first thing each FixedUpdate. One tick is
/// one simulated second.
#[derive(Resource, Default)]
pub struct TickCounter(pub u64);

pub fn advance_tick(mut tick: ResMut<TickCounter>) {
    tick.0 = tick.0.wrapping_add(1);
}

/// The whole crisis engine: tick counter, ordered system sets and the
/// orchestrator.
///
/// Insert a [`CrisisParams`] resource before adding the plugin to override
/// the defaults.
pub struct CrisisEnginePlugin;

impl Plugin for CrisisEnginePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CrisisParams>()
            .init_resource::<TickCounter>()
            .configure_sets(
                FixedUpdate,
                (
                    CrisisSet::Ingest,
                    CrisisSet::Orchestrate,
                    CrisisSet::Simulate,
                    CrisisSet::Present,
                )
                    .chain(),
            )
            .add_systems(
                FixedUpdate,
                advance_tick
                    .before(orchestrator::handle_control_signals)
                    .in_set(CrisisSet::Ingest),
            );

        app.add_plugins(orchestrator::OrchestratorPlugin);
    }
}
