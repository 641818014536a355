//! Crisis report export and load.
//!
//! Reports are written as pretty JSON or as a compressed binary container
//! (`SGRP` header, LZ4, bitcode). Both go through an atomic temp-then-rename
//! write. [`ReportPlugin`] answers `ExportReport` events inside the app.

use std::path::Path;

use bevy::prelude::*;

use simulation::feed::LogLevel;
use simulation::orchestrator::{CrisisLedger, CrisisRun, ExportReport, ReportFormat};
use simulation::report::CrisisReport;
use simulation::{CrisisSet, TickCounter};

mod atomic_write;
pub mod codec;
pub mod file_header;
mod report_error;

pub use atomic_write::atomic_write;
pub use report_error::ReportError;

/// Feed/log source for export messages.
pub const REPORTER: &str = "Reporter";

pub fn encode_report(report: &CrisisReport, format: ReportFormat) -> Result<Vec<u8>, ReportError> {
    match format {
        ReportFormat::Json => codec::encode_json(report),
        ReportFormat::Binary => Ok(codec::encode_binary(report)),
    }
}

/// Encode and atomically write `report`. Returns the number of bytes written.
pub fn export_report(
    report: &CrisisReport,
    path: impl AsRef<Path>,
    format: ReportFormat,
) -> Result<usize, ReportError> {
    let bytes = encode_report(report, format)?;
    atomic_write(path.as_ref(), &bytes)?;
    Ok(bytes.len())
}

/// Read a report written in either format; the format is sniffed from the
/// magic bytes.
pub fn load_report(path: impl AsRef<Path>) -> Result<CrisisReport, ReportError> {
    let bytes = std::fs::read(path)?;
    if file_header::has_magic(&bytes) {
        codec::decode_binary(&bytes)
    } else {
        codec::decode_json(&bytes)
    }
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// A report was written in response to an `ExportReport` request.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct ReportExported {
    pub path: String,
    pub format: ReportFormat,
    pub bytes: usize,
}

pub struct ReportPlugin;

impl Plugin for ReportPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<ReportExported>().add_systems(
            FixedUpdate,
            handle_export_requests.in_set(CrisisSet::Present),
        );
    }
}

fn handle_export_requests(
    tick: Res<TickCounter>,
    run: Res<CrisisRun>,
    mut requests: EventReader<ExportReport>,
    mut ledger: ResMut<CrisisLedger>,
    mut exported: EventWriter<ReportExported>,
) {
    for request in requests.read() {
        let report = CrisisReport::build(&run, &ledger, tick.0);
        match export_report(&report, &request.path, request.format) {
            Ok(bytes) => {
                ledger.log(
                    tick.0,
                    REPORTER,
                    LogLevel::Success,
                    format!(
                        "Report for run #{} written to {} ({bytes} bytes)",
                        report.run_id, request.path
                    ),
                );
                exported.send(ReportExported {
                    path: request.path.clone(),
                    format: request.format,
                    bytes,
                });
            }
            Err(e) => ledger.log(
                tick.0,
                REPORTER,
                LogLevel::Error,
                format!("Report export to {} failed: {e}", request.path),
            ),
        }
    }
}
