//! Resilient execution of agent procedures.
//!
//! [`run_resilient`] runs a fallible procedure and turns both an `Err` and a
//! panic into a typed fallback value plus an [`AgentFailure`]. The caller
//! decides how to surface the failure (audit entry, bus event); the run
//! itself always gets a value back.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::error::CrisisError;

/// Why an agent procedure fell back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub agent: String,
    pub message: String,
    pub panicked: bool,
}

/// Value produced by a resilient procedure, with the failure if the value is
/// the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Resilient<T> {
    pub value: T,
    pub failure: Option<AgentFailure>,
}

impl<T> Resilient<T> {
    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run `op` for `agent`; on error or panic substitute `fallback()`.
pub fn run_resilient<T, F, D>(agent: &str, op: F, fallback: D) -> Resilient<T>
where
    F: FnOnce() -> Result<T, CrisisError>,
    D: FnOnce() -> T,
{
    let failure = match catch_unwind(AssertUnwindSafe(op)) {
        Ok(Ok(value)) => {
            return Resilient {
                value,
                failure: None,
            }
        }
        Ok(Err(err)) => AgentFailure {
            agent: agent.to_string(),
            message: err.to_string(),
            panicked: false,
        },
        Err(payload) => AgentFailure {
            agent: agent.to_string(),
            message: CrisisError::AgentPanicked {
                agent: agent.to_string(),
                message: panic_message(payload),
            }
            .to_string(),
            panicked: true,
        },
    };
    Resilient {
        value: fallback(),
        failure: Some(failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_passes_value_through() {
        let out = run_resilient("Risk", || Ok(83), || 50);
        assert_eq!(out.value, 83);
        assert!(!out.is_fallback());
    }

    #[test]
    fn test_error_substitutes_fallback() {
        let out = run_resilient(
            "Resource",
            || -> Result<u32, CrisisError> {
                Err(CrisisError::InjectedFault {
                    agent: "Resource".into(),
                })
            },
            || 8,
        );
        assert_eq!(out.value, 8);
        let failure = out.failure.expect("failure recorded");
        assert_eq!(failure.agent, "Resource");
        assert!(!failure.panicked);
        assert!(failure.message.contains("injected fault"));
    }

    #[test]
    fn test_panic_substitutes_fallback() {
        let out = run_resilient(
            "Simulation",
            || -> Result<Vec<u8>, CrisisError> { panic!("grid exploded") },
            Vec::new,
        );
        assert!(out.value.is_empty());
        let failure = out.failure.expect("failure recorded");
        assert!(failure.panicked);
        assert!(failure.message.contains("grid exploded"), "{}", failure.message);
    }

    #[test]
    fn test_fallback_not_built_on_success() {
        let mut built = false;
        let _ = run_resilient("Risk", || Ok(1), || {
            built = true;
            0
        });
        assert!(!built);
    }
}
