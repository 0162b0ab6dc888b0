//! Registry of caller-defined notice kinds
//!
//! Custom kinds must be declared once, with their merge behaviour, before
//! notices of that kind can be sent or cached.

use crate::error::{BrokerError, Result};
use crate::kind::{NoticeKind, NoticeTypeRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Process-wide table of custom notice kinds
pub struct NoticeRegistry {
    custom: RwLock<HashMap<String, bool>>,
}

impl NoticeRegistry {
    fn new() -> Self {
        Self {
            custom: RwLock::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static NoticeRegistry {
        static REGISTRY: OnceLock<NoticeRegistry> = OnceLock::new();
        REGISTRY.get_or_init(NoticeRegistry::new)
    }

    /// Declare a custom kind.
    ///
    /// Registering the same name again with the same flag is a no-op.
    pub fn register_custom(&self, name: impl Into<String>, mergeable: bool) -> Result<NoticeKind> {
        let name = name.into();
        if name.is_empty() {
            return Err(BrokerError::InvalidArgument("custom notice name is empty".into()));
        }
        if NoticeKind::builtin_names().contains(&name.as_str()) {
            return Err(BrokerError::InvalidArgument(format!(
                "'{}' is a built-in notice kind",
                name
            )));
        }

        let mut custom = self.custom.write();
        match custom.get(&name) {
            Some(&existing) if existing != mergeable => Err(BrokerError::InvalidArgument(format!(
                "custom notice '{}' is already registered with mergeable = {}",
                name, existing
            ))),
            Some(_) => Ok(NoticeKind::Custom(name)),
            None => {
                log::debug!("Registered custom notice '{}' (mergeable: {})", name, mergeable);
                custom.insert(name.clone(), mergeable);
                Ok(NoticeKind::Custom(name))
            }
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.custom.read().contains_key(name)
    }

    /// Merge flag of a registered custom kind
    pub fn custom_mergeable(&self, name: &str) -> Option<bool> {
        self.custom.read().get(name).copied()
    }

    /// Check that `type_ref` names a concrete broker notice kind
    pub fn resolve(&self, type_ref: impl Into<NoticeTypeRef>) -> Result<NoticeKind> {
        match type_ref.into() {
            NoticeTypeRef::Stage(kind) => Err(BrokerError::not_a_broker_notice(kind.type_name())),
            NoticeTypeRef::Broker(kind) if kind.is_abstract() => {
                Err(BrokerError::not_a_broker_notice(kind.type_name()))
            }
            NoticeTypeRef::Broker(NoticeKind::Custom(name)) => {
                if self.is_registered(&name) {
                    Ok(NoticeKind::Custom(name))
                } else {
                    Err(BrokerError::not_a_broker_notice(&name))
                }
            }
            NoticeTypeRef::Broker(kind) => Ok(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notice_stage::StageNoticeKind;

    #[test]
    fn test_register_is_idempotent() {
        let registry = NoticeRegistry::global();
        let first = registry.register_custom("RegistryTest.Idempotent", true).unwrap();
        let second = registry.register_custom("RegistryTest.Idempotent", true).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.custom_mergeable("RegistryTest.Idempotent"), Some(true));
    }

    #[test]
    fn test_conflicting_flag_rejected() {
        let registry = NoticeRegistry::global();
        registry.register_custom("RegistryTest.Conflict", false).unwrap();
        assert!(matches!(
            registry.register_custom("RegistryTest.Conflict", true),
            Err(BrokerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_builtin_names_reserved() {
        let err = NoticeRegistry::global()
            .register_custom("Broker.ObjectsChanged", true)
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidArgument(_)));
    }

    #[test]
    fn test_resolve_rejects_non_broker_kinds() {
        let registry = NoticeRegistry::global();
        assert!(registry.resolve(StageNoticeKind::ObjectsChanged).is_err());
        assert!(registry.resolve(NoticeKind::StageNotice).is_err());
        assert!(registry.resolve(NoticeKind::custom("RegistryTest.Unknown")).is_err());
        assert_eq!(
            registry.resolve(NoticeKind::ObjectsChanged).unwrap(),
            NoticeKind::ObjectsChanged
        );

        let err = registry.resolve(StageNoticeKind::StageNotice).unwrap_err();
        assert!(err.to_string().contains("StageNotice root"));
    }
}
