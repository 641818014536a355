//! Headless engine construction shared by the demo run and `--agent` mode.

use bevy::prelude::*;

use simulation::orchestrator::{CrisisLedger, CrisisRun};
use simulation::report::CrisisReport;
use simulation::{CrisisEnginePlugin, CrisisParams, TickCounter};

/// Build a windowless app running the crisis engine and the report exporter.
///
/// `logging` installs Bevy's `LogPlugin`, which writes to stderr and leaves
/// stdout free for JSON output.
pub fn build_engine(params: CrisisParams, logging: bool) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    if logging {
        app.add_plugins(bevy::log::LogPlugin::default());
    }

    app.insert_resource(params);
    app.add_plugins((CrisisEnginePlugin, report::ReportPlugin));

    // Startup systems build the twin and the synthetic telemetry source.
    app.update();
    app
}

/// Advance the engine `ticks` fixed-update ticks, one simulated second each.
pub fn step(app: &mut App, ticks: u64) {
    for _ in 0..ticks {
        app.world_mut().run_schedule(FixedUpdate);
        // Lets assessment tasks on the compute pool make progress.
        std::thread::yield_now();
    }
}

pub fn current_tick(app: &App) -> u64 {
    app.world()
        .get_resource::<TickCounter>()
        .map(|t| t.0)
        .unwrap_or(0)
}

/// Snapshot the current run as an exportable report.
pub fn current_report(app: &App) -> CrisisReport {
    let world = app.world();
    CrisisReport::build(
        world.resource::<CrisisRun>(),
        world.resource::<CrisisLedger>(),
        current_tick(app),
    )
}
