//! Broker notices
//!
//! Every broker notice derives from the abstract `StageNotice` root. The
//! built-in kinds are all mergeable: repeated signal notices collapse into
//! one, payload notices fold their payloads together. Custom kinds declare
//! their merge behaviour when registered.

use crate::custom::CustomNotice;
use crate::error::{BrokerError, Result};
use crate::hierarchy::HierarchyChanged;
use crate::kind::NoticeKind;
use crate::layer_muting::LayerMutingChanged;
use crate::objects_changed::ObjectsChanged;
use notice_stage::{StageNotice, Value};
use serde::{Deserialize, Serialize};

/// A high-level notice delivered by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum Notice {
    StageContentsChanged,
    ObjectsChanged(ObjectsChanged),
    StageEditTargetChanged,
    LayerMutingChanged(LayerMutingChanged),
    HierarchyChanged(HierarchyChanged),
    Custom(CustomNotice),
}

impl Notice {
    /// Notice of a registered custom kind
    pub fn custom(name: impl Into<String>, payload: impl Into<Value>) -> Result<Self> {
        Ok(Self::Custom(CustomNotice::new(name, payload)?))
    }

    /// Translate a low-level stage notice. `StageClosing` has no broker
    /// counterpart.
    pub fn from_stage(notice: &StageNotice) -> Option<Self> {
        match notice {
            StageNotice::ObjectsChanged(event) => {
                Some(Self::ObjectsChanged(ObjectsChanged::from_event(event.clone())))
            }
            StageNotice::StageContentsChanged => Some(Self::StageContentsChanged),
            StageNotice::StageEditTargetChanged { .. } => Some(Self::StageEditTargetChanged),
            StageNotice::LayerMutingChanged { muted, unmuted } => Some(Self::LayerMutingChanged(
                LayerMutingChanged::new(muted.clone(), unmuted.clone()),
            )),
            StageNotice::StageClosing => None,
        }
    }

    pub fn kind(&self) -> NoticeKind {
        match self {
            Self::StageContentsChanged => NoticeKind::StageContentsChanged,
            Self::ObjectsChanged(_) => NoticeKind::ObjectsChanged,
            Self::StageEditTargetChanged => NoticeKind::StageEditTargetChanged,
            Self::LayerMutingChanged(_) => NoticeKind::LayerMutingChanged,
            Self::HierarchyChanged(_) => NoticeKind::HierarchyChanged,
            Self::Custom(custom) => custom.kind(),
        }
    }

    pub fn is_mergeable(&self) -> bool {
        match self {
            Self::Custom(custom) => custom.is_mergeable(),
            _ => true,
        }
    }

    /// Fold `later` into this notice.
    ///
    /// Both notices must share a mergeable kind.
    pub fn merge(&mut self, later: Notice) -> Result<()> {
        if self.kind() != later.kind() {
            return Err(BrokerError::InvalidArgument(format!(
                "cannot merge {} into {}",
                later.kind(),
                self.kind()
            )));
        }
        if !self.is_mergeable() {
            return Err(BrokerError::InvalidArgument(format!(
                "{} is not mergeable",
                self.kind()
            )));
        }

        self.fold(later);
        Ok(())
    }

    /// Payload merge for notices already known to share a mergeable kind
    pub(crate) fn fold(&mut self, later: Notice) {
        match (self, later) {
            (Self::ObjectsChanged(notice), Self::ObjectsChanged(later)) => notice.merge(later),
            (Self::LayerMutingChanged(notice), Self::LayerMutingChanged(later)) => {
                notice.merge(later)
            }
            (Self::HierarchyChanged(notice), Self::HierarchyChanged(later)) => notice.merge(later),
            (Self::Custom(notice), Self::Custom(later)) => notice.merge(later),
            _ => {}
        }
    }

    /// Merge without mutating either input
    pub fn merged(&self, later: &Notice) -> Result<Notice> {
        let mut notice = self.clone();
        notice.merge(later.clone())?;
        Ok(notice)
    }

    pub fn as_objects_changed(&self) -> Option<&ObjectsChanged> {
        match self {
            Self::ObjectsChanged(notice) => Some(notice),
            _ => None,
        }
    }

    pub fn as_layer_muting_changed(&self) -> Option<&LayerMutingChanged> {
        match self {
            Self::LayerMutingChanged(notice) => Some(notice),
            _ => None,
        }
    }

    pub fn as_hierarchy_changed(&self) -> Option<&HierarchyChanged> {
        match self {
            Self::HierarchyChanged(notice) => Some(notice),
            _ => None,
        }
    }

    pub fn as_custom(&self) -> Option<&CustomNotice> {
        match self {
            Self::Custom(notice) => Some(notice),
            _ => None,
        }
    }
}

impl From<ObjectsChanged> for Notice {
    fn from(notice: ObjectsChanged) -> Self {
        Self::ObjectsChanged(notice)
    }
}

impl From<LayerMutingChanged> for Notice {
    fn from(notice: LayerMutingChanged) -> Self {
        Self::LayerMutingChanged(notice)
    }
}

impl From<HierarchyChanged> for Notice {
    fn from(notice: HierarchyChanged) -> Self {
        Self::HierarchyChanged(notice)
    }
}
