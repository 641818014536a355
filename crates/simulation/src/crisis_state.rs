//! Crisis status machine.
//!
//! [`CrisisStatus`] is the single global status of a crisis run. Forward
//! transitions follow a fixed adjacency table; anything else is rejected and
//! leaves the status unchanged, which guards against
//! out-of-order completions from concurrently scheduled phase logic.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CrisisError;

/// Global status of the crisis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisStatus {
    #[default]
    Idle,
    Detected,
    Simulating,
    Negotiating,
    Mitigating,
    Mitigated,
    Resolved,
}

impl CrisisStatus {
    pub const ALL: [CrisisStatus; 7] = [
        CrisisStatus::Idle,
        CrisisStatus::Detected,
        CrisisStatus::Simulating,
        CrisisStatus::Negotiating,
        CrisisStatus::Mitigating,
        CrisisStatus::Mitigated,
        CrisisStatus::Resolved,
    ];

    /// The only status reachable from `self`.
    pub fn next(self) -> CrisisStatus {
        match self {
            CrisisStatus::Idle => CrisisStatus::Detected,
            CrisisStatus::Detected => CrisisStatus::Simulating,
            CrisisStatus::Simulating => CrisisStatus::Negotiating,
            CrisisStatus::Negotiating => CrisisStatus::Mitigating,
            CrisisStatus::Mitigating => CrisisStatus::Mitigated,
            CrisisStatus::Mitigated => CrisisStatus::Resolved,
            CrisisStatus::Resolved => CrisisStatus::Idle,
        }
    }

    pub fn can_transition_to(self, to: CrisisStatus) -> bool {
        self.next() == to
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrisisStatus::Idle => "idle",
            CrisisStatus::Detected => "detected",
            CrisisStatus::Simulating => "simulating",
            CrisisStatus::Negotiating => "negotiating",
            CrisisStatus::Mitigating => "mitigating",
            CrisisStatus::Mitigated => "mitigated",
            CrisisStatus::Resolved => "resolved",
        }
    }

    /// A run is active between detection and mitigation.
    pub fn is_active(self) -> bool {
        !matches!(self, CrisisStatus::Idle | CrisisStatus::Resolved)
    }
}

impl fmt::Display for CrisisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holder of the current status plus the transitions it has taken.
#[derive(Debug, Clone, Default)]
pub struct StatusMachine {
    status: CrisisStatus,
    rejected: u32,
}

impl StatusMachine {
    pub fn status(&self) -> CrisisStatus {
        self.status
    }

    /// Number of transitions rejected since the machine was created.
    pub fn rejected_count(&self) -> u32 {
        self.rejected
    }

    /// Apply `to` if the adjacency table allows it.
    ///
    /// On rejection the status is unchanged; the caller logs it.
    pub fn transition(&mut self, to: CrisisStatus) -> Result<CrisisStatus, CrisisError> {
        let from = self.status;
        if !from.can_transition_to(to) {
            self.rejected += 1;
            return Err(CrisisError::InvalidTransition { from, to });
        }
        self.status = to;
        Ok(from)
    }

    /// Force the machine back to idle outside the adjacency table.
    ///
    /// Only aborts use this; returns the status that was overridden.
    pub fn force_idle(&mut self) -> CrisisStatus {
        let from = self.status;
        self.status = CrisisStatus::Idle;
        from
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_chain_is_a_cycle() {
        let mut status = CrisisStatus::Idle;
        for _ in 0..CrisisStatus::ALL.len() {
            status = status.next();
        }
        assert_eq!(status, CrisisStatus::Idle);
    }

    #[test]
    fn test_only_next_is_legal() {
        for from in CrisisStatus::ALL {
            for to in CrisisStatus::ALL {
                assert_eq!(from.can_transition_to(to), from.next() == to, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_invalid_transition_leaves_status() {
        let mut machine = StatusMachine::default();
        let err = machine.transition(CrisisStatus::Mitigating).unwrap_err();
        assert_eq!(
            err,
            CrisisError::InvalidTransition {
                from: CrisisStatus::Idle,
                to: CrisisStatus::Mitigating
            }
        );
        assert_eq!(machine.status(), CrisisStatus::Idle);
        assert_eq!(machine.rejected_count(), 1);
    }

    #[test]
    fn test_full_walk() {
        let mut machine = StatusMachine::default();
        for to in CrisisStatus::ALL.iter().skip(1) {
            machine.transition(*to).expect("forward transition");
        }
        assert_eq!(machine.status(), CrisisStatus::Resolved);
        machine.transition(CrisisStatus::Idle).expect("resolved -> idle");
        assert_eq!(machine.rejected_count(), 0);
    }

    #[test]
    fn test_self_transition_rejected() {
        let mut machine = StatusMachine::default();
        assert!(machine.transition(CrisisStatus::Idle).is_err());
    }

    #[test]
    fn test_force_idle() {
        let mut machine = StatusMachine::default();
        machine.transition(CrisisStatus::Detected).expect("idle -> detected");
        assert_eq!(machine.force_idle(), CrisisStatus::Detected);
        assert_eq!(machine.status(), CrisisStatus::Idle);
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(CrisisStatus::Negotiating.to_string(), "negotiating");
        assert_eq!(
            serde_json::to_string(&CrisisStatus::Mitigated).expect("serialize"),
            "\"mitigated\""
        );
    }
}
