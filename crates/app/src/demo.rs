//! Default mode: one scripted crisis run with automatic approval.
//!
//! Every state-feed record is printed to stdout as a JSON line while the run
//! progresses. The report is exported once the run has finished.

use std::io::Write;
use std::path::Path;

use bevy::prelude::*;

use simulation::orchestrator::{
    CrisisLedger, CrisisRun, GrantHumanApproval, InjectCrisis, ReportFormat, RunStage,
};
use simulation::CrisisParams;

use crate::engine;

pub const DEFAULT_MAX_TICKS: u64 = 5_000;
pub const AUTO_APPROVER: &str = "auto-approver";

/// `.json` files get pretty JSON, anything else the binary container.
pub fn format_for(path: &Path) -> ReportFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => ReportFormat::Json,
        _ => ReportFormat::Binary,
    }
}

pub fn run_demo(
    params: CrisisParams,
    report_path: Option<&Path>,
    max_ticks: Option<u64>,
) -> Result<(), String> {
    let mut app = engine::build_engine(params, true);
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();

    let max_ticks = max_ticks.unwrap_or(DEFAULT_MAX_TICKS);
    let finished = drive_scripted_run(&mut app, max_ticks, &mut stdout)?;
    if !finished {
        warn!("Run still in progress after the tick limit; exporting its current state");
    }

    if let Some(path) = report_path {
        let report = engine::current_report(&app);
        let bytes = report::export_report(&report, path, format_for(path))
            .map_err(|e| format!("report export to {} failed: {e}", path.display()))?;
        info!("Report for run #{} written to {} ({bytes} bytes)", report.run_id, path.display());
    }
    Ok(())
}

/// Inject, approve whenever asked, and stream feed records to `out`.
/// Returns whether the run finished within `max_ticks`.
fn drive_scripted_run(app: &mut App, max_ticks: u64, out: &mut impl Write) -> Result<bool, String> {
    app.world_mut().send_event(InjectCrisis);
    let mut cursor = 0;
    let mut approved = false;

    for elapsed in 0..max_ticks {
        engine::step(app, 1);
        cursor = flush_feed(app, cursor, out)?;

        let run = app.world().resource::<CrisisRun>();
        if elapsed > 0 && !run.in_progress() {
            return Ok(true);
        }
        if !approved && matches!(run.stage, RunStage::AwaitingApproval { .. }) {
            app.world_mut().send_event(GrantHumanApproval {
                approver: AUTO_APPROVER.to_string(),
            });
            approved = true;
        }
    }
    Ok(false)
}

fn flush_feed(app: &App, cursor: u64, out: &mut impl Write) -> Result<u64, String> {
    let feed = &app.world().resource::<CrisisLedger>().feed;
    for record in feed.records_since(cursor) {
        let line = serde_json::to_string(record).map_err(|e| e.to_string())?;
        writeln!(out, "{line}").map_err(|e| e.to_string())?;
    }
    out.flush().map_err(|e| e.to_string())?;
    Ok(feed.last_seq())
}
