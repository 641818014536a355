//! Operator signals and external telemetry.

use crate::orchestrator::{
    AbortCrisis, ExportReport, GrantHumanApproval, InjectCrisis, ReportFormat, TelemetryReading,
};
use crate::telemetry::TelemetryPacket;

use super::TestCrisis;

impl TestCrisis {
    // -----------------------------------------------------------------------
    // Signals (read on the next tick)
    // -----------------------------------------------------------------------

    pub fn inject(&mut self) -> &mut Self {
        self.app.world_mut().send_event(InjectCrisis);
        self
    }

    pub fn approve(&mut self, approver: &str) -> &mut Self {
        self.app.world_mut().send_event(GrantHumanApproval {
            approver: approver.to_string(),
        });
        self
    }

    pub fn abort(&mut self, reason: &str) -> &mut Self {
        self.app.world_mut().send_event(AbortCrisis {
            reason: reason.to_string(),
        });
        self
    }

    pub fn send_telemetry(&mut self, packet: TelemetryPacket) -> &mut Self {
        self.app.world_mut().send_event(TelemetryReading(packet));
        self
    }

    pub fn request_export(&mut self, path: &str, format: ReportFormat) -> &mut Self {
        self.app.world_mut().send_event(ExportReport {
            path: path.to_string(),
            format,
        });
        self
    }
}
