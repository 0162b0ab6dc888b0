//! Prim hierarchy tracking
//!
//! [`HierarchyBroadcaster`] keeps a [`HierarchyCache`] of the stage's prim
//! paths and, on every flush carrying an `ObjectsChanged` notice, compares
//! the resynced subtrees against the live stage. The outcome is sent as a
//! [`HierarchyChanged`] notice in the same flush.

use crate::broadcaster::{BroadcastContext, Broadcaster};
use crate::error::Result;
use crate::notice::Notice;
use notice_stage::{ScenePath, Stage};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

/// Prims added, removed or resynced in place, with the fields touched per path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyChanged {
    added: BTreeSet<ScenePath>,
    removed: BTreeSet<ScenePath>,
    modified: BTreeSet<ScenePath>,
    changed_fields: BTreeMap<ScenePath, BTreeSet<String>>,
}

impl HierarchyChanged {
    pub fn added(&self) -> &BTreeSet<ScenePath> {
        &self.added
    }

    pub fn removed(&self) -> &BTreeSet<ScenePath> {
        &self.removed
    }

    pub fn modified(&self) -> &BTreeSet<ScenePath> {
        &self.modified
    }

    pub fn changed_fields(&self) -> &BTreeMap<ScenePath, BTreeSet<String>> {
        &self.changed_fields
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Fold a later summary into this one.
    ///
    /// A prim added then removed disappears from both sets; a prim removed
    /// then added again counts as modified.
    pub fn merge(&mut self, later: HierarchyChanged) {
        for path in later.added {
            if self.removed.remove(&path) {
                self.modified.insert(path);
            } else {
                self.added.insert(path);
            }
        }
        for path in later.removed {
            self.modified.remove(&path);
            if !self.added.remove(&path) {
                self.removed.insert(path);
            }
        }
        for path in later.modified {
            if !self.added.contains(&path) {
                self.modified.insert(path);
            }
        }
        for (path, names) in later.changed_fields {
            self.changed_fields.entry(path).or_default().extend(names);
        }
    }
}

/// Snapshot of a stage's prim paths, updated from resynced paths
#[derive(Debug, Clone, Default)]
pub struct HierarchyCache {
    prims: BTreeSet<ScenePath>,
    added: BTreeSet<ScenePath>,
    removed: BTreeSet<ScenePath>,
    modified: BTreeSet<ScenePath>,
}

impl HierarchyCache {
    pub fn new(stage: &Stage) -> Self {
        Self {
            prims: stage.prim_paths().into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn contains(&self, path: &ScenePath) -> bool {
        self.prims.contains(path)
    }

    /// Cached prim paths, sorted
    pub fn prim_paths(&self) -> impl Iterator<Item = &ScenePath> + '_ {
        self.prims.iter()
    }

    /// Re-read every resynced subtree from `stage`.
    ///
    /// Property paths are reported as modified without touching the cache.
    pub fn update(&mut self, stage: &Stage, resynced: &[ScenePath]) {
        let mut roots = resynced.to_vec();
        ScenePath::remove_descendant_paths(&mut roots);
        let live: BTreeSet<ScenePath> = stage.prim_paths().into_iter().collect();

        for root in roots {
            if root.is_property_path() {
                self.modified.insert(root);
                continue;
            }
            if root.is_absolute_root() {
                self.modified.insert(root.clone());
            }

            let cached: Vec<ScenePath> = self
                .prims
                .iter()
                .filter(|path| path.has_prefix(&root))
                .cloned()
                .collect();
            for path in cached {
                if live.contains(&path) {
                    self.modified.insert(path);
                } else {
                    self.prims.remove(&path);
                    self.removed.insert(path);
                }
            }

            for path in live.iter().filter(|path| path.has_prefix(&root)) {
                if self.prims.insert(path.clone()) {
                    self.added.insert(path.clone());
                }
            }
        }
    }

    pub fn did_change(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty())
    }

    pub fn added(&self) -> &BTreeSet<ScenePath> {
        &self.added
    }

    pub fn removed(&self) -> &BTreeSet<ScenePath> {
        &self.removed
    }

    pub fn modified(&self) -> &BTreeSet<ScenePath> {
        &self.modified
    }

    /// Forget the changes recorded since the last clear; cached prims stay
    pub fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.modified.clear();
    }

    fn take_changes(&mut self) -> (BTreeSet<ScenePath>, BTreeSet<ScenePath>, BTreeSet<ScenePath>) {
        (
            std::mem::take(&mut self.added),
            std::mem::take(&mut self.removed),
            std::mem::take(&mut self.modified),
        )
    }
}

/// Turns merged `ObjectsChanged` notices into [`HierarchyChanged`] summaries
#[derive(Debug)]
pub struct HierarchyBroadcaster {
    cache: HierarchyCache,
}

impl HierarchyBroadcaster {
    pub const IDENTIFIER: &'static str = "HierarchyBroadcaster";

    pub fn new(stage: &Stage) -> Self {
        Self {
            cache: HierarchyCache::new(stage),
        }
    }

    pub fn cache(&self) -> &HierarchyCache {
        &self.cache
    }
}

impl Broadcaster for HierarchyBroadcaster {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    fn execute(&mut self, context: &mut BroadcastContext<'_>) -> Result<()> {
        let (Some(objects), Some(stage)) = (context.objects_changed(), context.stage()) else {
            return Ok(());
        };

        self.cache.update(stage, objects.resynced_paths());
        if objects.changed_info_only_paths().is_empty() && !self.cache.did_change() {
            return Ok(());
        }

        let (added, removed, modified) = self.cache.take_changes();
        let changed = HierarchyChanged {
            added,
            removed,
            modified,
            changed_fields: objects.all_changed_fields().clone(),
        };
        log::trace!(
            "Hierarchy changed: {} added, {} removed, {} modified",
            changed.added.len(),
            changed.removed.len(),
            changed.modified.len()
        );
        context.send(Notice::HierarchyChanged(changed))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ScenePath {
        ScenePath::parse(s).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<ScenePath> {
        items.iter().map(|p| path(p)).collect()
    }

    #[test]
    fn test_update_classifies_subtree() {
        let stage = Stage::create_in_memory();
        stage.define_prim("/Foo/Bar").unwrap();
        stage.define_prim("/Gone/Child").unwrap();
        let mut cache = HierarchyCache::new(&stage);

        stage.define_prim("/Foo/Baz/Leaf").unwrap();
        stage.remove_prim("/Gone").unwrap();
        cache.update(&stage, &[path("/Foo"), path("/Gone"), path("/Foo/Baz")]);

        assert_eq!(cache.added(), &set(&["/Foo/Baz", "/Foo/Baz/Leaf"]));
        assert_eq!(cache.removed(), &set(&["/Gone", "/Gone/Child"]));
        assert_eq!(cache.modified(), &set(&["/Foo", "/Foo/Bar"]));
        assert!(cache.contains(&path("/Foo/Baz/Leaf")));
        assert!(!cache.contains(&path("/Gone")));
    }

    #[test]
    fn test_unknown_path_is_ignored() {
        let stage = Stage::create_in_memory();
        let mut cache = HierarchyCache::new(&stage);
        cache.update(&stage, &[path("/Nowhere")]);
        assert!(!cache.did_change());
    }

    #[test]
    fn test_property_and_root_resyncs() {
        let stage = Stage::create_in_memory();
        stage.define_prim("/Foo").unwrap();
        let mut cache = HierarchyCache::new(&stage);

        cache.update(&stage, &[path("/Foo.size")]);
        assert_eq!(cache.modified(), &set(&["/Foo.size"]));
        cache.clear();

        cache.update(&stage, &[ScenePath::absolute_root()]);
        assert_eq!(cache.modified(), &set(&["/", "/Foo"]));
        assert_eq!(cache.prim_paths().count(), 1);
    }

    #[test]
    fn test_merge_reconciles_sets() {
        let mut first = HierarchyChanged {
            added: set(&["/A"]),
            removed: set(&["/B"]),
            ..Default::default()
        };
        first.merge(HierarchyChanged {
            added: set(&["/B"]),
            removed: set(&["/A"]),
            modified: set(&["/C"]),
            ..Default::default()
        });

        assert!(first.added().is_empty());
        assert!(first.removed().is_empty());
        assert_eq!(first.modified(), &set(&["/B", "/C"]));
    }
}
