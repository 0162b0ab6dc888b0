//! Notice kind tags

use notice_stage::StageNoticeKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a broker notice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoticeKind {
    /// Abstract root of every broker notice; never instantiated
    StageNotice,
    StageContentsChanged,
    ObjectsChanged,
    StageEditTargetChanged,
    LayerMutingChanged,
    /// Prim hierarchy summary produced by the hierarchy broadcaster
    HierarchyChanged,
    /// Caller-defined kind declared in the [`NoticeRegistry`](crate::NoticeRegistry)
    Custom(String),
}

impl NoticeKind {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Stable identifier for logs and error messages
    pub fn type_name(&self) -> &str {
        match self {
            Self::StageNotice => "Broker.StageNotice",
            Self::StageContentsChanged => "Broker.StageContentsChanged",
            Self::ObjectsChanged => "Broker.ObjectsChanged",
            Self::StageEditTargetChanged => "Broker.StageEditTargetChanged",
            Self::LayerMutingChanged => "Broker.LayerMutingChanged",
            Self::HierarchyChanged => "Broker.HierarchyChanged",
            Self::Custom(name) => name,
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::StageNotice)
    }

    pub(crate) fn builtin_names() -> [&'static str; 6] {
        [
            "Broker.StageNotice",
            "Broker.StageContentsChanged",
            "Broker.ObjectsChanged",
            "Broker.StageEditTargetChanged",
            "Broker.LayerMutingChanged",
            "Broker.HierarchyChanged",
        ]
    }
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Any notice type a caller can name, broker or low-level
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeTypeRef {
    Broker(NoticeKind),
    Stage(StageNoticeKind),
}

impl NoticeTypeRef {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Broker(kind) => kind.type_name(),
            Self::Stage(kind) => kind.type_name(),
        }
    }
}

impl From<NoticeKind> for NoticeTypeRef {
    fn from(kind: NoticeKind) -> Self {
        Self::Broker(kind)
    }
}

impl From<&NoticeKind> for NoticeTypeRef {
    fn from(kind: &NoticeKind) -> Self {
        Self::Broker(kind.clone())
    }
}

impl From<StageNoticeKind> for NoticeTypeRef {
    fn from(kind: StageNoticeKind) -> Self {
        Self::Stage(kind)
    }
}
