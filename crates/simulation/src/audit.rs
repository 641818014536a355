//! Audit trail of a crisis run.
//!
//! Plain entries record what an agent did. Governance decisions are also
//! hashed onto the run's [`DecisionChain`] and carry `hash` and
//! `previous_hash`, so the chained subset of the trail can be re-verified
//! from its own contents.

use serde::{Deserialize, Serialize};

use crate::chain_hash::{ChainLink, ChainVerification, DecisionChain};
use crate::error::CrisisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub tick: u64,
    pub actor: String,
    pub action: String,
    pub detail: String,
    pub severity: Severity,
    pub hash: Option<String>,
    pub previous_hash: Option<String>,
}

impl AuditEntry {
    pub fn is_chained(&self) -> bool {
        self.hash.is_some()
    }

    /// The object hashed onto the decision chain for this entry.
    pub fn decision(&self) -> serde_json::Value {
        decision_object(self.tick, &self.actor, &self.action, &self.detail)
    }
}

fn decision_object(tick: u64, actor: &str, action: &str, detail: &str) -> serde_json::Value {
    serde_json::json!({
        "tick": tick,
        "actor": actor,
        "action": action,
        "detail": detail,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, mut entry: AuditEntry) -> AuditEntry {
        entry.seq = self.entries.len() as u64 + 1;
        self.entries.push(entry.clone());
        entry
    }

    /// Append an unchained entry.
    pub fn record(
        &mut self,
        tick: u64,
        actor: &str,
        action: &str,
        detail: &str,
        severity: Severity,
    ) -> AuditEntry {
        self.push(AuditEntry {
            seq: 0,
            tick,
            actor: actor.to_string(),
            action: action.to_string(),
            detail: detail.to_string(),
            severity,
            hash: None,
            previous_hash: None,
        })
    }

    /// Hash a governance decision onto `chain` and append it.
    pub fn record_decision(
        &mut self,
        chain: &mut DecisionChain,
        tick: u64,
        actor: &str,
        action: &str,
        detail: &str,
        severity: Severity,
    ) -> Result<AuditEntry, CrisisError> {
        let link = chain.chain_hash_decision(&decision_object(tick, actor, action, detail))?;
        Ok(self.push(AuditEntry {
            seq: 0,
            tick,
            actor: actor.to_string(),
            action: action.to_string(),
            detail: detail.to_string(),
            severity,
            hash: Some(link.hash),
            previous_hash: Some(link.previous_hash),
        }))
    }

    pub fn chained(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|e| e.is_chained())
    }

    /// Rebuild the chain from the chained entries and verify it.
    pub fn verify_chain(&self) -> ChainVerification {
        let links: Vec<ChainLink> = self
            .chained()
            .enumerate()
            .map(|(i, e)| ChainLink {
                index: i as u32,
                decision: e.decision(),
                previous_hash: e.previous_hash.clone().unwrap_or_default(),
                hash: e.hash.clone().unwrap_or_default(),
            })
            .collect();
        DecisionChain::verify(&links)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GENESIS_HASH;

    #[test]
    fn test_plain_entries_are_numbered() {
        let mut trail = AuditTrail::default();
        trail.record(1, "Sentinel", "anomaly_detected", "zone-1", Severity::Warning);
        let e = trail.record(2, "Risk", "assessment", "83", Severity::Info);
        assert_eq!(e.seq, 2);
        assert!(!e.is_chained());
        assert_eq!(trail.len(), 2);
    }

    #[test]
    fn test_decisions_link_to_previous() {
        let mut trail = AuditTrail::default();
        let mut chain = DecisionChain::default();
        let a = trail
            .record_decision(&mut chain, 10, "Governance", "approved", "auto", Severity::Info)
            .expect("hashable");
        trail.record(11, "Response", "deploy", "pumps", Severity::Info);
        let b = trail
            .record_decision(&mut chain, 30, "Governance", "resolved", "done", Severity::Info)
            .expect("hashable");
        assert_eq!(a.previous_hash.as_deref(), Some(GENESIS_HASH));
        assert_eq!(b.previous_hash, a.hash);
        assert_eq!(trail.chained().count(), 2);
        assert_eq!(trail.verify_chain(), ChainVerification::Valid);
    }

    #[test]
    fn test_edited_entry_breaks_chain() {
        let mut trail = AuditTrail::default();
        let mut chain = DecisionChain::default();
        for i in 0..3 {
            trail
                .record_decision(&mut chain, i, "Governance", "approved", "x", Severity::Info)
                .expect("hashable");
        }
        trail.entries[1].detail = "rewritten".to_string();
        assert_eq!(trail.verify_chain(), ChainVerification::BrokenAt(1));
    }
}
