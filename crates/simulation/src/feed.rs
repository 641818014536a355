//! Outbound state-change feed.
//!
//! Everything a UI needs to render a run (log lines, status changes, zone
//! updates, metrics, audit entries and negotiation lines) is appended here as
//! a timestamped [`FeedRecord`]. Consumers poll with a cursor via
//! [`CrisisFeed::records_since`]; the engine never dictates rendering.

use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;
use crate::crisis_state::CrisisStatus;
use crate::zones::ZoneStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedKind {
    Log {
        agent: String,
        level: LogLevel,
        message: String,
    },
    Status {
        from: CrisisStatus,
        to: CrisisStatus,
    },
    Zone {
        zone: String,
        status: ZoneStatus,
        risk: f64,
    },
    Metric {
        name: String,
        value: f64,
    },
    Audit {
        entry: AuditEntry,
    },
    Negotiation {
        round: u32,
        speaker: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub seq: u64,
    pub tick: u64,
    #[serde(flatten)]
    pub kind: FeedKind,
}

/// Ordered, append-only record list.
#[derive(Debug, Clone, Default)]
pub struct CrisisFeed {
    records: Vec<FeedRecord>,
}

impl CrisisFeed {
    pub fn push(&mut self, tick: u64, kind: FeedKind) -> u64 {
        let seq = self.records.len() as u64 + 1;
        self.records.push(FeedRecord { seq, tick, kind });
        seq
    }

    pub fn log(
        &mut self,
        tick: u64,
        agent: &str,
        level: LogLevel,
        message: impl Into<String>,
    ) -> u64 {
        self.push(
            tick,
            FeedKind::Log {
                agent: agent.to_string(),
                level,
                message: message.into(),
            },
        )
    }

    pub fn metric(&mut self, tick: u64, name: &str, value: f64) -> u64 {
        self.push(
            tick,
            FeedKind::Metric {
                name: name.to_string(),
                value,
            },
        )
    }

    pub fn records(&self) -> &[FeedRecord] {
        &self.records
    }

    /// Records with `seq` greater than `cursor`.
    pub fn records_since(&self, cursor: u64) -> &[FeedRecord] {
        let start = (cursor as usize).min(self.records.len());
        &self.records[start..]
    }

    pub fn last_seq(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn logs_from<'a>(&'a self, agent: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.records.iter().filter_map(move |r| match &r.kind {
            FeedKind::Log {
                agent: a, message, ..
            } if a == agent => Some(message.as_str()),
            _ => None,
        })
    }
}
