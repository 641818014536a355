//! Hash chain over sequential governance decisions.
//!
//! Each link hashes `previous_hash + canonical_json(decision)` with SHA-256.
//! Canonical JSON sorts object keys recursively and drops insignificant
//! whitespace, so the same decision hashes the same regardless of field
//! order. One authority computes the whole chain; this is tamper evidence,
//! not consensus.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::GENESIS_HASH;
use crate::error::CrisisError;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Serialize `value` with object keys sorted at every level.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    use serde_json::Value;
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&Value::String(s.clone()).to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
    }
}

/// One decision in the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLink {
    pub index: u32,
    pub decision: serde_json::Value,
    pub previous_hash: String,
    pub hash: String,
}

/// Result of [`DecisionChain::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainVerification {
    Valid,
    /// Index of the first link whose hash or back-pointer does not match.
    BrokenAt(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionChain {
    head: String,
    links: Vec<ChainLink>,
}

impl Default for DecisionChain {
    fn default() -> Self {
        Self {
            head: GENESIS_HASH.to_string(),
            links: Vec::new(),
        }
    }
}

fn link_hash(previous: &str, decision: &serde_json::Value) -> String {
    let mut material = String::with_capacity(previous.len() + 128);
    material.push_str(previous);
    material.push_str(&canonical_json(decision));
    sha256_hex(material.as_bytes())
}

impl DecisionChain {
    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// Hash `decision` onto the chain and advance the head.
    pub fn chain_hash_decision<T: Serialize>(
        &mut self,
        decision: &T,
    ) -> Result<ChainLink, CrisisError> {
        let decision = serde_json::to_value(decision)?;
        let previous_hash = self.head.clone();
        let hash = link_hash(&previous_hash, &decision);
        let link = ChainLink {
            index: self.links.len() as u32,
            decision,
            previous_hash,
            hash: hash.clone(),
        };
        self.head = hash;
        self.links.push(link.clone());
        Ok(link)
    }

    /// Recompute every link from genesis.
    pub fn verify(links: &[ChainLink]) -> ChainVerification {
        let mut previous = GENESIS_HASH.to_string();
        for (i, link) in links.iter().enumerate() {
            if link.previous_hash != previous || link_hash(&previous, &link.decision) != link.hash {
                return ChainVerification::BrokenAt(i);
            }
            previous = link.hash.clone();
        }
        ChainVerification::Valid
    }

    /// Back to genesis with no links.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
