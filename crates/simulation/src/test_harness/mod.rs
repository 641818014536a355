//! # TestCrisis: headless integration test harness for the crisis engine
//!
//! Wraps `bevy::app::App` + `CrisisEnginePlugin` so tests can inject a
//! crisis, drive the `FixedUpdate` schedule tick by tick and inspect every
//! engine resource without a window or renderer.

mod assertions;
mod queries;
mod setup;
mod signals;

use bevy::app::App;
use bevy::prelude::*;

use crate::crisis_params::CrisisParams;
use crate::CrisisEnginePlugin;

/// A headless Bevy App wrapping `CrisisEnginePlugin` for integration testing.
///
/// Configure with the builder methods, send signals, then call `tick()` to
/// advance the engine and query or assert on the resulting state.
pub struct TestCrisis {
    app: App,
}

impl TestCrisis {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Engine with default parameters: paced phases and assessments spawned
    /// on the async compute pool.
    pub fn new() -> Self {
        Self::with_params(CrisisParams::default())
    }

    /// Zero phase delays and inline assessments. A full run completes in a
    /// handful of ticks.
    pub fn immediate() -> Self {
        Self::with_params(CrisisParams::immediate())
    }

    pub fn with_params(params: CrisisParams) -> Self {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);

        // Inserted BEFORE the plugin so the twin and the synthetic source are
        // built from these parameters.
        app.insert_resource(params);
        app.add_plugins(CrisisEnginePlugin);

        // Run one update so Startup systems execute.
        app.update();

        Self { app }
    }
}

impl Default for TestCrisis {
    fn default() -> Self {
        Self::new()
    }
}
