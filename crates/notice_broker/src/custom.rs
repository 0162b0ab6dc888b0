//! Caller-defined notices

use crate::error::{BrokerError, Result};
use crate::kind::NoticeKind;
use crate::notice_registry::NoticeRegistry;
use notice_stage::Value;
use serde::{Deserialize, Serialize};

/// Notice of a kind declared through [`NoticeRegistry::register_custom`].
///
/// Merge behaviour always comes from the registry entry for `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomNotice {
    name: String,
    payload: Value,
}

impl CustomNotice {
    /// Build a notice of a registered custom kind
    pub fn new(name: impl Into<String>, payload: impl Into<Value>) -> Result<Self> {
        let name = name.into();
        if !NoticeRegistry::global().is_registered(&name) {
            return Err(BrokerError::not_a_broker_notice(&name));
        }
        Ok(Self {
            name,
            payload: payload.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NoticeKind {
        NoticeKind::Custom(self.name.clone())
    }

    /// False for names the registry does not know
    pub fn is_mergeable(&self) -> bool {
        NoticeRegistry::global()
            .custom_mergeable(&self.name)
            .unwrap_or(false)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub(crate) fn merge(&mut self, later: CustomNotice) {
        self.payload.merge(later.payload);
    }
}
