// ---------------------------------------------------------------------------
// CrisisError: typed errors for the crisis engine
// ---------------------------------------------------------------------------

use std::fmt;

use crate::crisis_state::CrisisStatus;

/// Errors raised by the crisis engine.
///
/// Most of these are caught close to where they happen: unknown evidence at
/// the Bayesian call site, agent failures by the resilient task wrapper,
/// invalid transitions by the status machine. None of them abort a run.
#[derive(Debug, Clone, PartialEq)]
pub enum CrisisError {
    /// A Bayesian update named an evidence type with no likelihood function.
    UnknownEvidenceType(String),
    /// A status change that is not in the adjacency table.
    InvalidTransition {
        from: CrisisStatus,
        to: CrisisStatus,
    },
    /// JSON serialization of a decision or payload failed.
    Serialization(String),
    /// A concurrently scheduled agent procedure panicked.
    AgentPanicked { agent: String, message: String },
    /// A fault was injected into an agent procedure (chaos testing).
    InjectedFault { agent: String },
    /// A configuration file could not be parsed.
    Config(String),
}

impl fmt::Display for CrisisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrisisError::UnknownEvidenceType(kind) => {
                write!(f, "unknown evidence type: {kind}")
            }
            CrisisError::InvalidTransition { from, to } => {
                write!(f, "invalid status transition: {from} -> {to}")
            }
            CrisisError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            CrisisError::AgentPanicked { agent, message } => {
                write!(f, "{agent} agent panicked: {message}")
            }
            CrisisError::InjectedFault { agent } => {
                write!(f, "injected fault in {agent} agent")
            }
            CrisisError::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for CrisisError {}

impl From<serde_json::Error> for CrisisError {
    fn from(e: serde_json::Error) -> Self {
        CrisisError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unknown_evidence() {
        let err = CrisisError::UnknownEvidenceType("tarot".to_string());
        let msg = format!("{err}");
        assert!(msg.contains("unknown evidence type"), "got: {msg}");
        assert!(msg.contains("tarot"), "got: {msg}");
    }

    #[test]
    fn test_display_invalid_transition() {
        let err = CrisisError::InvalidTransition {
            from: CrisisStatus::Idle,
            to: CrisisStatus::Resolved,
        };
        let msg = format!("{err}");
        assert!(msg.contains("idle -> resolved"), "got: {msg}");
    }

    #[test]
    fn test_from_serde_json_error() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json");
        let err: CrisisError = bad.unwrap_err().into();
        assert!(matches!(err, CrisisError::Serialization(_)));
    }

    #[test]
    fn test_is_error_trait() {
        let err = CrisisError::Config("bad".to_string());
        let as_dyn: &dyn std::error::Error = &err;
        assert!(as_dyn.source().is_none());
    }
}
