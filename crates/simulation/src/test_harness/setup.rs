//! Builder methods that reconfigure a running `TestCrisis`.

use crate::agents::AgentKind;
use crate::crisis_params::CrisisParams;
use crate::orchestrator::{FaultInjection, FaultMode};
use crate::telemetry::SyntheticTelemetry;

use super::TestCrisis;

impl TestCrisis {
    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Require an operator approval before execution.
    pub fn with_human_in_the_loop(mut self, timeout_ticks: u64) -> Self {
        {
            let mut params = self.app.world_mut().resource_mut::<CrisisParams>();
            params.governance.human_in_the_loop = true;
            params.governance.approval_timeout_ticks = timeout_ticks;
        }
        self
    }

    /// Make one assessment procedure fail on every run.
    pub fn with_fault(mut self, agent: AgentKind, mode: FaultMode) -> Self {
        self.app
            .world_mut()
            .resource_mut::<FaultInjection>()
            .inject(agent, mode);
        self
    }

    /// Stop the built-in synthetic source; only packets sent with
    /// `send_telemetry` reach the engine.
    pub fn without_synthetic_telemetry(mut self) -> Self {
        self.app
            .world_mut()
            .resource_mut::<SyntheticTelemetry>()
            .enabled = false;
        self
    }

    /// Switch the continuous flood loop off.
    pub fn without_continuous_loop(mut self) -> Self {
        self.app
            .world_mut()
            .resource_mut::<CrisisParams>()
            .continuous
            .enabled = false;
        self
    }

    /// Add a downstream plugin (report export, for example) to the engine.
    pub fn with_plugin(mut self, plugin: impl bevy::app::Plugin) -> Self {
        self.app.add_plugins(plugin);
        self
    }

    /// Arbitrary edit of the live parameters.
    pub fn with_params_edit(mut self, edit: impl FnOnce(&mut CrisisParams)) -> Self {
        edit(&mut self.app.world_mut().resource_mut::<CrisisParams>());
        self
    }
}
