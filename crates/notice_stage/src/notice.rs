//! Low-level notices emitted by a stage
//!
//! One notice describes one atomic change. A single stage operation emits a
//! fixed sequence of them.

use crate::path::ScenePath;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Paths and fields touched by a single change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectsChangedEvent {
    pub resynced_paths: Vec<ScenePath>,
    pub changed_info_only_paths: Vec<ScenePath>,
    pub changed_fields: BTreeMap<ScenePath, BTreeSet<String>>,
}

impl ObjectsChangedEvent {
    /// A structural change to `path`
    pub fn resync(path: ScenePath) -> Self {
        Self {
            resynced_paths: vec![path],
            ..Default::default()
        }
    }

    /// A non-structural change of `field` on `path`
    pub fn info_only(path: ScenePath, field: impl Into<String>) -> Self {
        let mut event = Self {
            changed_info_only_paths: vec![path.clone()],
            ..Default::default()
        };
        event.changed_fields.entry(path).or_default().insert(field.into());
        event
    }

    /// Record a changed field on `path`
    pub fn with_field(mut self, path: ScenePath, field: impl Into<String>) -> Self {
        self.changed_fields.entry(path).or_default().insert(field.into());
        self
    }
}

/// A low-level stage notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageNotice {
    ObjectsChanged(ObjectsChangedEvent),
    StageContentsChanged,
    StageEditTargetChanged { layer: String },
    LayerMutingChanged { muted: Vec<String>, unmuted: Vec<String> },
    StageClosing,
}

impl StageNotice {
    pub fn kind(&self) -> StageNoticeKind {
        match self {
            Self::ObjectsChanged(_) => StageNoticeKind::ObjectsChanged,
            Self::StageContentsChanged => StageNoticeKind::StageContentsChanged,
            Self::StageEditTargetChanged { .. } => StageNoticeKind::StageEditTargetChanged,
            Self::LayerMutingChanged { .. } => StageNoticeKind::LayerMutingChanged,
            Self::StageClosing => StageNoticeKind::StageClosing,
        }
    }
}

/// Type tag for low-level notices, including their abstract root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageNoticeKind {
    StageNotice,
    ObjectsChanged,
    StageContentsChanged,
    StageEditTargetChanged,
    LayerMutingChanged,
    StageClosing,
}

impl StageNoticeKind {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::StageNotice => "Stage.StageNotice",
            Self::ObjectsChanged => "Stage.ObjectsChanged",
            Self::StageContentsChanged => "Stage.StageContentsChanged",
            Self::StageEditTargetChanged => "Stage.StageEditTargetChanged",
            Self::LayerMutingChanged => "Stage.LayerMutingChanged",
            Self::StageClosing => "Stage.StageClosing",
        }
    }
}

impl fmt::Display for StageNoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_only_records_field() {
        let path = ScenePath::parse("/Foo").unwrap();
        let event = ObjectsChangedEvent::info_only(path.clone(), "comment");
        assert!(event.resynced_paths.is_empty());
        assert_eq!(event.changed_info_only_paths, vec![path.clone()]);
        assert!(event.changed_fields[&path].contains("comment"));
    }

    #[test]
    fn test_kind_tags() {
        let notice = StageNotice::LayerMutingChanged {
            muted: vec!["a".into()],
            unmuted: Vec::new(),
        };
        assert_eq!(notice.kind(), StageNoticeKind::LayerMutingChanged);
        assert_eq!(StageNotice::StageClosing.kind().to_string(), "Stage.StageClosing");
    }
}
