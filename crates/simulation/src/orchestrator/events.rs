use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetryPacket;

/// Start a crisis run. Ignored while one is in progress.
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct InjectCrisis;

/// Operator approval of the pending mitigation plan.
#[derive(Event, Debug, Clone)]
pub struct GrantHumanApproval {
    pub approver: String,
}

/// Abort the run in progress.
#[derive(Event, Debug, Clone)]
pub struct AbortCrisis {
    pub reason: String,
}

/// A telemetry packet from an external source.
#[derive(Event, Debug, Clone, Copy)]
pub struct TelemetryReading(pub TelemetryPacket);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Json,
    /// Compressed binary container.
    Binary,
}

/// Write the current run's report to `path`.
#[derive(Event, Debug, Clone)]
pub struct ExportReport {
    pub path: String,
    pub format: ReportFormat,
}
