//! `ObjectsChanged` payload and merge rules

use notice_stage::{ObjectsChangedEvent, ScenePath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Paths resynced or changed in place, with the fields touched per path.
///
/// A resynced path supersedes any info-only change on itself or its
/// descendants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectsChanged {
    resynced_paths: Vec<ScenePath>,
    changed_info_only_paths: Vec<ScenePath>,
    changed_fields: BTreeMap<ScenePath, BTreeSet<String>>,
}

impl ObjectsChanged {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_event(event: ObjectsChangedEvent) -> Self {
        let mut notice = Self::new();
        for path in event.resynced_paths {
            notice.add_resynced(path);
        }
        for path in event.changed_info_only_paths {
            notice.add_info_only(path);
        }
        notice.union_fields(event.changed_fields);
        notice
    }

    /// Record a structural change
    pub fn add_resynced(&mut self, path: ScenePath) {
        self.changed_info_only_paths.retain(|info| !info.has_prefix(&path));
        if !self.resynced_paths.contains(&path) {
            self.resynced_paths.push(path);
        }
    }

    /// Record an in-place change, unless a resync already covers it
    pub fn add_info_only(&mut self, path: ScenePath) {
        if self.resynced_object(&path) || self.changed_info_only_paths.contains(&path) {
            return;
        }
        self.changed_info_only_paths.push(path);
    }

    pub fn add_changed_field(&mut self, path: ScenePath, field: impl Into<String>) {
        self.changed_fields.entry(path).or_default().insert(field.into());
    }

    pub fn resynced_paths(&self) -> &[ScenePath] {
        &self.resynced_paths
    }

    pub fn changed_info_only_paths(&self) -> &[ScenePath] {
        &self.changed_info_only_paths
    }

    /// True when `path` or one of its ancestors was resynced
    pub fn resynced_object(&self, path: &ScenePath) -> bool {
        self.resynced_paths.iter().any(|resynced| path.has_prefix(resynced))
    }

    /// True when `path` or one of its ancestors changed in place
    pub fn changed_info_only(&self, path: &ScenePath) -> bool {
        self.changed_info_only_paths.iter().any(|info| path.has_prefix(info))
    }

    pub fn affected_object(&self, path: &ScenePath) -> bool {
        self.resynced_object(path) || self.changed_info_only(path)
    }

    /// Fields changed on exactly `path`
    pub fn changed_fields(&self, path: &ScenePath) -> BTreeSet<String> {
        self.changed_fields.get(path).cloned().unwrap_or_default()
    }

    pub fn has_changed_fields(&self, path: &ScenePath) -> bool {
        self.changed_fields.contains_key(path)
    }

    pub fn all_changed_fields(&self) -> &BTreeMap<ScenePath, BTreeSet<String>> {
        &self.changed_fields
    }

    /// Fold a later notice into this one
    pub fn merge(&mut self, later: ObjectsChanged) {
        for path in later.resynced_paths {
            self.add_resynced(path);
        }
        for path in later.changed_info_only_paths {
            self.add_info_only(path);
        }
        self.union_fields(later.changed_fields);
    }

    /// Drop resynced paths whose ancestor is resynced too
    pub fn prune_descendant_resyncs(&mut self) {
        ScenePath::remove_descendant_paths(&mut self.resynced_paths);
    }

    fn union_fields(&mut self, fields: BTreeMap<ScenePath, BTreeSet<String>>) {
        for (path, names) in fields {
            self.changed_fields.entry(path).or_default().extend(names);
        }
    }
}

impl From<ObjectsChangedEvent> for ObjectsChanged {
    fn from(event: ObjectsChangedEvent) -> Self {
        Self::from_event(event)
    }
}
