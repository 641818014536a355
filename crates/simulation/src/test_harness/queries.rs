//! Query and simulation-tick methods for `TestCrisis`.

use bevy::prelude::*;

use crate::audit::AuditTrail;
use crate::crisis_params::CrisisParams;
use crate::crisis_state::CrisisStatus;
use crate::event_store::EventStore;
use crate::feed::CrisisFeed;
use crate::orchestrator::{AssessmentTasks, CrisisLedger, CrisisRun, DigitalTwin, RiskGauge};
use crate::projection::CrisisProjection;
use crate::report::CrisisReport;
use crate::telemetry::TelemetryFeed;
use crate::zones::Zone;
use crate::TickCounter;

use super::TestCrisis;

impl TestCrisis {
    // -----------------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------------

    /// Run N fixed-update ticks by directly executing the `FixedUpdate`
    /// schedule, bypassing Bevy's virtual time.
    ///
    /// A `yield_now()` between ticks lets the `AsyncComputeTaskPool` threads
    /// make progress while the test drives the schedule in a tight loop.
    pub fn tick(&mut self, n: u32) -> &mut Self {
        for _ in 0..n {
            self.app.world_mut().run_schedule(FixedUpdate);
            std::thread::yield_now();
        }
        self
    }

    /// Tick until `done` holds, at most `max` ticks. Returns whether it held.
    pub fn tick_until(&mut self, max: u32, mut done: impl FnMut(&TestCrisis) -> bool) -> bool {
        for _ in 0..max {
            if done(self) {
                return true;
            }
            self.tick(1);
        }
        done(self)
    }

    /// Tick until the current run has resolved or been aborted.
    pub fn run_to_completion(&mut self, max: u32) -> &mut Self {
        // The inject signal is only read on the next tick.
        self.tick(1);
        let finished = self.tick_until(max, |c| !c.run().in_progress());
        assert!(
            finished,
            "run did not complete within {max} ticks (status {}, stage {:?})",
            self.status(),
            self.run().stage
        );
        self
    }

    pub fn tick_until_status(&mut self, status: CrisisStatus, max: u32) -> bool {
        self.tick_until(max, |c| c.status() == status)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn tick_count(&self) -> u64 {
        self.app.world().resource::<TickCounter>().0
    }

    pub fn params(&self) -> &CrisisParams {
        self.app.world().resource::<CrisisParams>()
    }

    pub fn run(&self) -> &CrisisRun {
        self.app.world().resource::<CrisisRun>()
    }

    pub fn status(&self) -> CrisisStatus {
        self.run().status()
    }

    pub fn twin(&self) -> &DigitalTwin {
        self.app.world().resource::<DigitalTwin>()
    }

    pub fn ledger(&self) -> &CrisisLedger {
        self.app.world().resource::<CrisisLedger>()
    }

    pub fn store(&self) -> &EventStore {
        &self.ledger().store
    }

    pub fn feed(&self) -> &CrisisFeed {
        &self.ledger().feed
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.ledger().audit
    }

    pub fn telemetry(&self) -> &TelemetryFeed {
        self.app.world().resource::<TelemetryFeed>()
    }

    pub fn gauge(&self) -> RiskGauge {
        *self.app.world().resource::<RiskGauge>()
    }

    pub fn assessments_in_flight(&self) -> bool {
        self.app.world().resource::<AssessmentTasks>().in_flight()
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.run().zones.get(id)
    }

    pub fn projection(&self) -> CrisisProjection {
        CrisisProjection::replay(self.store())
    }

    pub fn report(&self) -> CrisisReport {
        CrisisReport::build(self.run(), self.ledger(), self.tick_count())
    }

    /// Log messages written by `agent`.
    pub fn logs_from(&self, agent: &str) -> Vec<String> {
        self.feed().logs_from(agent).map(str::to_string).collect()
    }

    /// Event types in the store, oldest first.
    pub fn event_types(&self) -> Vec<String> {
        self.store()
            .events()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect()
    }
}
