//! Deterministic crisis ordering via `SystemSet` phases.
//!
//! Every system the crisis engine registers in `FixedUpdate` belongs to one of
//! these sets, configured as a chain:
//!
//! ```text
//! Ingest  →  Orchestrate  →  Simulate  →  Present
//! ```
//!
//! * **Ingest** – Control signals (inject, approve, abort) and telemetry
//!   packets, synthetic or external. Nothing downstream reads a half-applied
//!   signal.
//! * **Orchestrate** – The phase driver, the assessment join and the approval
//!   wait. Owns every crisis status transition.
//! * **Simulate** – The continuous flood loop over the digital twin.
//! * **Present** – Cosmetic state only: the animated risk gauge. These systems
//!   never mutate engine state.

use bevy::prelude::*;

/// Ordered phases for the crisis systems in the `FixedUpdate` schedule.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum CrisisSet {
    /// Inbound control signals and telemetry.
    Ingest,
    /// Phase sequencing, assessment join, approval wait.
    Orchestrate,
    /// Continuous flood stepping and escalation checks.
    Simulate,
    /// Read-only presentation state.
    Present,
}
