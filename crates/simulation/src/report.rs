//! Post-run crisis report.

use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;
use crate::chain_hash::ChainVerification;
use crate::crisis_state::CrisisStatus;
use crate::negotiation::TranscriptEntry;
use crate::orchestrator::{CrisisLedger, CrisisRun, MitigationPlan, Phase, RunMetrics, RunOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisReport {
    pub run_id: u32,
    pub generated_at_tick: u64,
    pub status: CrisisStatus,
    pub phases: Vec<Phase>,
    pub audit_trail: Vec<AuditEntry>,
    pub negotiation_transcript: Vec<TranscriptEntry>,
    pub mitigation_plan: Option<MitigationPlan>,
    pub outcome: Option<RunOutcome>,
    pub metrics: RunMetrics,
    pub approver: Option<String>,
    pub chain_head: String,
    pub chain_verified: bool,
}

impl CrisisReport {
    pub fn build(run: &CrisisRun, ledger: &CrisisLedger, tick: u64) -> Self {
        Self {
            run_id: run.run_id,
            generated_at_tick: tick,
            status: run.status(),
            phases: run.completed_phases().to_vec(),
            audit_trail: ledger.audit.entries().to_vec(),
            negotiation_transcript: run
                .negotiation
                .as_ref()
                .map(|n| n.transcript.clone())
                .unwrap_or_default(),
            mitigation_plan: run.plan.clone(),
            outcome: run.outcome.clone(),
            metrics: run.metrics,
            approver: run.approver.clone(),
            chain_head: ledger.chain.head().to_string(),
            chain_verified: ledger.audit.verify_chain() == ChainVerification::Valid,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, crate::error::CrisisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Severity;
    use crate::config::GENESIS_HASH;

    #[test]
    fn test_report_of_idle_engine() {
        let report = CrisisReport::build(&CrisisRun::default(), &CrisisLedger::default(), 7);
        assert_eq!(report.run_id, 0);
        assert_eq!(report.generated_at_tick, 7);
        assert_eq!(report.status, CrisisStatus::Idle);
        assert_eq!(report.chain_head, GENESIS_HASH);
        assert!(report.chain_verified);
        assert!(report.mitigation_plan.is_none());
    }

    #[test]
    fn test_chain_head_follows_decisions() {
        let mut ledger = CrisisLedger::default();
        let entry = ledger
            .decision(3, "Governance", "approved", "approver=auto", Severity::Info)
            .unwrap();
        let report = CrisisReport::build(&CrisisRun::default(), &ledger, 4);
        assert_eq!(Some(report.chain_head.clone()), entry.hash);
        assert_eq!(report.audit_trail.len(), 1);
        let json = report.to_json_pretty().unwrap();
        assert!(json.contains("\"chain_verified\": true"));
    }
}
