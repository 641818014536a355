// ---------------------------------------------------------------------------
// codec – CrisisReport <-> bitcode records, plus the JSON form
// ---------------------------------------------------------------------------
//
// The binary form mirrors the report with plain bitcode structs. Enums are
// stored as u8 tags so the wire layout does not depend on serde attributes of
// the simulation types.

use bitcode::{Decode, Encode};

use simulation::audit::{AuditEntry, Severity};
use simulation::crisis_state::CrisisStatus;
use simulation::infrastructure_graph::{Bottleneck, EvacuationRoute, Route};
use simulation::negotiation::TranscriptEntry;
use simulation::orchestrator::{MitigationPlan, Phase, RunMetrics, RunOutcome};
use simulation::report::CrisisReport;

use crate::file_header::{unwrap_header, wrap_with_header, FLAG_COMPRESSED};
use crate::report_error::ReportError;

/// Schema version of [`ReportRecord`]. Bump on any layout change.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Enum tags
// ---------------------------------------------------------------------------

pub fn status_to_u8(s: CrisisStatus) -> u8 {
    match s {
        CrisisStatus::Idle => 0,
        CrisisStatus::Detected => 1,
        CrisisStatus::Simulating => 2,
        CrisisStatus::Negotiating => 3,
        CrisisStatus::Mitigating => 4,
        CrisisStatus::Mitigated => 5,
        CrisisStatus::Resolved => 6,
    }
}

pub fn u8_to_status(v: u8) -> Option<CrisisStatus> {
    Some(match v {
        0 => CrisisStatus::Idle,
        1 => CrisisStatus::Detected,
        2 => CrisisStatus::Simulating,
        3 => CrisisStatus::Negotiating,
        4 => CrisisStatus::Mitigating,
        5 => CrisisStatus::Mitigated,
        6 => CrisisStatus::Resolved,
        _ => return None,
    })
}

pub fn phase_to_u8(p: Phase) -> u8 {
    match p {
        Phase::Detection => 0,
        Phase::ParallelAssessment => 1,
        Phase::ResponsePlanning => 2,
        Phase::Negotiation => 3,
        Phase::GovernanceApproval => 4,
        Phase::Execution => 5,
        Phase::Resolution => 6,
    }
}

pub fn u8_to_phase(v: u8) -> Option<Phase> {
    Phase::ALL.get(usize::from(v)).copied()
}

pub fn severity_to_u8(s: Severity) -> u8 {
    match s {
        Severity::Info => 0,
        Severity::Warning => 1,
        Severity::Critical => 2,
    }
}

pub fn u8_to_severity(v: u8) -> Option<Severity> {
    Some(match v {
        0 => Severity::Info,
        1 => Severity::Warning,
        2 => Severity::Critical,
        _ => return None,
    })
}

const OUTCOME_NONE: u8 = 0;
const OUTCOME_RESOLVED: u8 = 1;
const OUTCOME_ABORTED: u8 = 2;

fn bad_tag(what: &str, v: u8) -> ReportError {
    ReportError::Decode(format!("unknown {what} tag {v}"))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Encode, Decode, Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub seq: u64,
    pub tick: u64,
    pub actor: String,
    pub action: String,
    pub detail: String,
    pub severity: u8,
    pub hash: Option<String>,
    pub previous_hash: Option<String>,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq)]
pub struct TranscriptRecord {
    pub round: u32,
    pub speaker: String,
    pub message: String,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq)]
pub struct BottleneckRecord {
    pub from: String,
    pub to: String,
    pub capacity: u32,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq)]
pub struct RouteRecord {
    pub zone: String,
    pub path: Vec<String>,
    pub total_cost: f64,
    pub bottleneck: Option<BottleneckRecord>,
    /// False when no shelter was reachable; `path` is then empty.
    pub reachable: bool,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq)]
pub struct PlanRecord {
    pub action: String,
    pub zones: Vec<String>,
    pub resources: Vec<String>,
    pub estimated_time_minutes: u32,
    pub confidence: f64,
    pub routes: Vec<RouteRecord>,
}

#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq)]
pub struct MetricsRecord {
    pub initial_risk: f64,
    pub peak_risk: f64,
    pub current_risk: f64,
    pub final_risk: f64,
    pub risk_reduction: f64,
    pub damage_prevented: f64,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq)]
pub struct ReportRecord {
    pub schema_version: u32,
    pub run_id: u32,
    pub generated_at_tick: u64,
    pub status: u8,
    pub phases: Vec<u8>,
    pub audit_trail: Vec<AuditRecord>,
    pub transcript: Vec<TranscriptRecord>,
    pub plan: Option<PlanRecord>,
    pub outcome: u8,
    pub abort_reason: String,
    pub metrics: MetricsRecord,
    pub approver: Option<String>,
    pub chain_head: String,
    pub chain_verified: bool,
}

// ---------------------------------------------------------------------------
// CrisisReport -> record
// ---------------------------------------------------------------------------

fn route_record(r: &EvacuationRoute) -> RouteRecord {
    match &r.route {
        Some(route) => RouteRecord {
            zone: r.zone.clone(),
            path: route.path.clone(),
            total_cost: route.total_cost,
            bottleneck: route.bottleneck.as_ref().map(|b| BottleneckRecord {
                from: b.from.clone(),
                to: b.to.clone(),
                capacity: b.capacity,
            }),
            reachable: true,
        },
        None => RouteRecord {
            zone: r.zone.clone(),
            path: Vec::new(),
            total_cost: 0.0,
            bottleneck: None,
            reachable: false,
        },
    }
}

impl From<&CrisisReport> for ReportRecord {
    fn from(r: &CrisisReport) -> Self {
        let (outcome, abort_reason) = match &r.outcome {
            None => (OUTCOME_NONE, String::new()),
            Some(RunOutcome::Resolved) => (OUTCOME_RESOLVED, String::new()),
            Some(RunOutcome::Aborted { reason }) => (OUTCOME_ABORTED, reason.clone()),
        };
        let m = r.metrics;
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            run_id: r.run_id,
            generated_at_tick: r.generated_at_tick,
            status: status_to_u8(r.status),
            phases: r.phases.iter().copied().map(phase_to_u8).collect(),
            audit_trail: r
                .audit_trail
                .iter()
                .map(|e| AuditRecord {
                    seq: e.seq,
                    tick: e.tick,
                    actor: e.actor.clone(),
                    action: e.action.clone(),
                    detail: e.detail.clone(),
                    severity: severity_to_u8(e.severity),
                    hash: e.hash.clone(),
                    previous_hash: e.previous_hash.clone(),
                })
                .collect(),
            transcript: r
                .negotiation_transcript
                .iter()
                .map(|t| TranscriptRecord {
                    round: t.round,
                    speaker: t.speaker.clone(),
                    message: t.message.clone(),
                })
                .collect(),
            plan: r.mitigation_plan.as_ref().map(|p| PlanRecord {
                action: p.action.clone(),
                zones: p.zones.clone(),
                resources: p.resources.clone(),
                estimated_time_minutes: p.estimated_time_minutes,
                confidence: p.confidence,
                routes: p.routes.iter().map(route_record).collect(),
            }),
            outcome,
            abort_reason,
            metrics: MetricsRecord {
                initial_risk: m.initial_risk,
                peak_risk: m.peak_risk,
                current_risk: m.current_risk,
                final_risk: m.final_risk,
                risk_reduction: m.risk_reduction,
                damage_prevented: m.damage_prevented,
            },
            approver: r.approver.clone(),
            chain_head: r.chain_head.clone(),
            chain_verified: r.chain_verified,
        }
    }
}

// ---------------------------------------------------------------------------
// record -> CrisisReport
// ---------------------------------------------------------------------------

fn evacuation_route(r: RouteRecord) -> EvacuationRoute {
    EvacuationRoute {
        zone: r.zone,
        route: r.reachable.then(|| Route {
            path: r.path,
            total_cost: r.total_cost,
            bottleneck: r.bottleneck.map(|b| Bottleneck {
                from: b.from,
                to: b.to,
                capacity: b.capacity,
            }),
        }),
    }
}

impl ReportRecord {
    pub fn into_report(self) -> Result<CrisisReport, ReportError> {
        if self.schema_version > REPORT_SCHEMA_VERSION {
            return Err(ReportError::VersionMismatch {
                expected_max: REPORT_SCHEMA_VERSION,
                found: self.schema_version,
            });
        }
        let status = u8_to_status(self.status).ok_or_else(|| bad_tag("status", self.status))?;
        let phases = self
            .phases
            .iter()
            .map(|&v| u8_to_phase(v).ok_or_else(|| bad_tag("phase", v)))
            .collect::<Result<Vec<_>, _>>()?;
        let audit_trail = self
            .audit_trail
            .into_iter()
            .map(|e| {
                let severity =
                    u8_to_severity(e.severity).ok_or_else(|| bad_tag("severity", e.severity))?;
                Ok(AuditEntry {
                    seq: e.seq,
                    tick: e.tick,
                    actor: e.actor,
                    action: e.action,
                    detail: e.detail,
                    severity,
                    hash: e.hash,
                    previous_hash: e.previous_hash,
                })
            })
            .collect::<Result<Vec<_>, ReportError>>()?;
        let outcome = match self.outcome {
            OUTCOME_NONE => None,
            OUTCOME_RESOLVED => Some(RunOutcome::Resolved),
            OUTCOME_ABORTED => Some(RunOutcome::Aborted {
                reason: self.abort_reason,
            }),
            v => return Err(bad_tag("outcome", v)),
        };
        let m = self.metrics;

        Ok(CrisisReport {
            run_id: self.run_id,
            generated_at_tick: self.generated_at_tick,
            status,
            phases,
            audit_trail,
            negotiation_transcript: self
                .transcript
                .into_iter()
                .map(|t| TranscriptEntry {
                    round: t.round,
                    speaker: t.speaker,
                    message: t.message,
                })
                .collect(),
            mitigation_plan: self.plan.map(|p| MitigationPlan {
                action: p.action,
                zones: p.zones,
                resources: p.resources,
                estimated_time_minutes: p.estimated_time_minutes,
                confidence: p.confidence,
                routes: p.routes.into_iter().map(evacuation_route).collect(),
            }),
            outcome,
            metrics: RunMetrics {
                initial_risk: m.initial_risk,
                peak_risk: m.peak_risk,
                current_risk: m.current_risk,
                final_risk: m.final_risk,
                risk_reduction: m.risk_reduction,
                damage_prevented: m.damage_prevented,
            },
            approver: self.approver,
            chain_head: self.chain_head,
            chain_verified: self.chain_verified,
        })
    }
}

// ---------------------------------------------------------------------------
// Byte-level encode / decode
// ---------------------------------------------------------------------------

/// bitcode -> LZ4 -> 28-byte header.
pub fn encode_binary(report: &CrisisReport) -> Vec<u8> {
    let raw = bitcode::encode(&ReportRecord::from(report));
    let compressed = lz4_flex::compress_prepend_size(&raw);
    wrap_with_header(&compressed, FLAG_COMPRESSED, raw.len())
}

pub fn decode_binary(bytes: &[u8]) -> Result<CrisisReport, ReportError> {
    let (header, payload) = unwrap_header(bytes)?;
    let raw = if header.is_compressed() {
        lz4_flex::decompress_size_prepended(payload)?
    } else {
        payload.to_vec()
    };
    if raw.len() != header.uncompressed_size as usize {
        return Err(ReportError::Corrupt(format!(
            "payload is {} bytes, header says {}",
            raw.len(),
            header.uncompressed_size
        )));
    }
    let record: ReportRecord = bitcode::decode(&raw)?;
    record.into_report()
}

pub fn encode_json(report: &CrisisReport) -> Result<Vec<u8>, ReportError> {
    Ok(report.to_json_pretty()?.into_bytes())
}

pub fn decode_json(bytes: &[u8]) -> Result<CrisisReport, ReportError> {
    Ok(serde_json::from_slice(bytes)?)
}
