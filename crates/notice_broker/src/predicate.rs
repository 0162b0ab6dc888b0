//! Capture predicates
//!
//! While a transaction is open, the predicate on top of the filter stack
//! decides the fate of every notice the broker receives.

use crate::error::Result;
use crate::kind::{NoticeKind, NoticeTypeRef};
use crate::notice::Notice;
use crate::notice_registry::NoticeRegistry;
use std::fmt;
use std::sync::Arc;

/// What happens to a notice sent during a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDecision {
    /// Buffer until the outermost transaction ends
    Capture,
    /// Drop; never cached, never delivered
    Discard,
    /// Deliver right away, leaving the transaction open
    PassThrough,
}

type DecisionFn = Arc<dyn Fn(&Notice) -> CaptureDecision + Send + Sync>;

/// Filter deciding whether notices are captured
#[derive(Clone, Default)]
pub enum CapturePredicate {
    /// Capture everything
    #[default]
    Default,
    /// Discard everything
    BlockAll,
    Custom(DecisionFn),
}

impl CapturePredicate {
    /// Capture when `f` returns true, discard otherwise
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Notice) -> bool + Send + Sync + 'static,
    {
        Self::decide(move |notice| {
            if f(notice) {
                CaptureDecision::Capture
            } else {
                CaptureDecision::Discard
            }
        })
    }

    /// Deliver immediately when `f` returns true, capture otherwise
    pub fn passthrough<F>(f: F) -> Self
    where
        F: Fn(&Notice) -> bool + Send + Sync + 'static,
    {
        Self::decide(move |notice| {
            if f(notice) {
                CaptureDecision::PassThrough
            } else {
                CaptureDecision::Capture
            }
        })
    }

    pub fn decide<F>(f: F) -> Self
    where
        F: Fn(&Notice) -> CaptureDecision + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Capture only the listed kinds and discard the rest
    pub fn for_kinds<I, K>(kinds: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<NoticeTypeRef>,
    {
        let registry = NoticeRegistry::global();
        let kinds = kinds
            .into_iter()
            .map(|kind| registry.resolve(kind))
            .collect::<Result<Vec<NoticeKind>>>()?;

        Ok(Self::new(move |notice| kinds.contains(&notice.kind())))
    }

    pub fn evaluate(&self, notice: &Notice) -> CaptureDecision {
        match self {
            Self::Default => CaptureDecision::Capture,
            Self::BlockAll => CaptureDecision::Discard,
            Self::Custom(f) => f(notice),
        }
    }
}

impl fmt::Debug for CapturePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::BlockAll => f.write_str("BlockAll"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BrokerError;
    use notice_stage::StageNoticeKind;

    #[test]
    fn test_builtin_decisions() {
        let notice = Notice::StageContentsChanged;
        assert_eq!(CapturePredicate::Default.evaluate(&notice), CaptureDecision::Capture);
        assert_eq!(CapturePredicate::BlockAll.evaluate(&notice), CaptureDecision::Discard);
    }

    #[test]
    fn test_bool_predicates() {
        let contents_only = CapturePredicate::new(|n| n.kind() == NoticeKind::StageContentsChanged);
        assert_eq!(contents_only.evaluate(&Notice::StageContentsChanged), CaptureDecision::Capture);
        assert_eq!(contents_only.evaluate(&Notice::StageEditTargetChanged), CaptureDecision::Discard);

        let urgent = CapturePredicate::passthrough(|n| n.kind() == NoticeKind::StageEditTargetChanged);
        assert_eq!(urgent.evaluate(&Notice::StageEditTargetChanged), CaptureDecision::PassThrough);
        assert_eq!(urgent.evaluate(&Notice::StageContentsChanged), CaptureDecision::Capture);
    }

    #[test]
    fn test_for_kinds_validates() {
        let predicate = CapturePredicate::for_kinds([NoticeKind::ObjectsChanged]).unwrap();
        assert_eq!(predicate.evaluate(&Notice::StageContentsChanged), CaptureDecision::Discard);

        let err = CapturePredicate::for_kinds([StageNoticeKind::ObjectsChanged]).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidArgument(_)));
        assert!(CapturePredicate::for_kinds([NoticeKind::StageNotice]).is_err());
    }
}
