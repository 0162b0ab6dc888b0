//! Broker configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Behaviour switches applied when a broker is first created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Report unmatched `end_transaction`/`pop_filter` as `InvalidState`
    /// instead of ignoring them with a warning
    pub strict_nesting: bool,
    /// Drop resynced paths covered by a resynced ancestor before a merged
    /// `ObjectsChanged` notice is delivered
    pub prune_descendant_resyncs: bool,
}

impl BrokerConfig {
    /// Parse from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn strict() -> Self {
        Self {
            strict_nesting: true,
            ..Default::default()
        }
    }
}
