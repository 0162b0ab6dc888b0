//! In-memory stage
//!
//! The stage owns a flat table of prim specs keyed by path, a layer stack
//! and the set of muted layers. Mutations update the state under a write
//! lock, release it, then emit their notices to every registered listener.

use crate::error::{ListenerError, Result, StageError};
use crate::notice::{ObjectsChangedEvent, StageNotice};
use crate::path::{AsScenePath, ScenePath};
use crate::value::Value;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_STAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique stage identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageId(u64);

impl StageId {
    fn next() -> Self {
        Self(NEXT_STAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage:{}", self.0)
    }
}

/// Handle returned by [`Stage::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerKey(u64);

type StageListener = Arc<dyn Fn(&StageNotice) -> std::result::Result<(), ListenerError> + Send + Sync>;

#[derive(Debug, Default)]
struct PrimSpec {
    metadata: HashMap<String, Value>,
    properties: HashMap<String, Value>,
}

struct StageState {
    prims: BTreeMap<ScenePath, PrimSpec>,
    sublayers: Vec<String>,
    muted: Vec<String>,
    edit_target: String,
}

/// A scene stage
pub struct Stage {
    id: StageId,
    root_layer: String,
    state: RwLock<StageState>,
    listeners: RwLock<Vec<(ListenerKey, StageListener)>>,
    next_listener: AtomicU64,
}

impl Stage {
    /// Create an empty stage backed by an anonymous in-memory root layer
    pub fn create_in_memory() -> Arc<Stage> {
        let id = StageId::next();
        Self::build(id, format!("memory:{}/root", id.raw()))
    }

    /// Create an empty stage whose root layer has the given identifier
    pub fn create_in_memory_with_root(identifier: impl Into<String>) -> Arc<Stage> {
        Self::build(StageId::next(), identifier.into())
    }

    fn build(id: StageId, root_layer: String) -> Arc<Stage> {
        log::debug!("Created {} with root layer '{}'", id, root_layer);
        Arc::new(Self {
            id,
            state: RwLock::new(StageState {
                prims: BTreeMap::new(),
                sublayers: Vec::new(),
                muted: Vec::new(),
                edit_target: root_layer.clone(),
            }),
            root_layer,
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        })
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn root_layer(&self) -> &str {
        &self.root_layer
    }

    /// Root layer followed by sublayers, strongest first
    pub fn layer_stack(&self) -> Vec<String> {
        let state = self.state.read();
        std::iter::once(self.root_layer.clone())
            .chain(state.sublayers.iter().cloned())
            .collect()
    }

    pub fn muted_layers(&self) -> Vec<String> {
        self.state.read().muted.clone()
    }

    pub fn is_layer_muted(&self, identifier: &str) -> bool {
        self.state.read().muted.iter().any(|layer| layer == identifier)
    }

    pub fn edit_target(&self) -> String {
        self.state.read().edit_target.clone()
    }

    pub fn has_prim(&self, path: impl AsScenePath) -> bool {
        match path.to_scene_path() {
            Ok(path) => self.state.read().prims.contains_key(&path),
            Err(_) => false,
        }
    }

    /// All defined prim paths, sorted
    pub fn prim_paths(&self) -> Vec<ScenePath> {
        self.state.read().prims.keys().cloned().collect()
    }

    pub fn metadata(&self, path: impl AsScenePath, key: &str) -> Option<Value> {
        let path = path.to_scene_path().ok()?;
        self.state.read().prims.get(&path)?.metadata.get(key).cloned()
    }

    pub fn property(&self, path: impl AsScenePath, name: &str) -> Option<Value> {
        let path = path.to_scene_path().ok()?;
        self.state.read().prims.get(&path)?.properties.get(name).cloned()
    }

    /// Define a prim and any missing ancestors.
    ///
    /// Each newly created prim emits `ObjectsChanged` followed by
    /// `StageContentsChanged`, shallowest first. Redefining an existing prim
    /// emits nothing.
    pub fn define_prim(&self, path: impl AsScenePath) -> Result<()> {
        let path = prim_path_arg(path)?;

        let created: Vec<ScenePath> = {
            let mut state = self.state.write();
            let mut created = Vec::new();
            for prefix in path.prefixes() {
                if !state.prims.contains_key(&prefix) {
                    state.prims.insert(prefix.clone(), PrimSpec::default());
                    created.push(prefix);
                }
            }
            created
        };

        for prim in created {
            let event = ObjectsChangedEvent::resync(prim.clone()).with_field(prim, "specifier");
            self.emit(&StageNotice::ObjectsChanged(event))?;
            self.emit(&StageNotice::StageContentsChanged)?;
        }
        Ok(())
    }

    /// Remove a prim and its descendants. Returns `false` when no prim
    /// exists at `path`.
    pub fn remove_prim(&self, path: impl AsScenePath) -> Result<bool> {
        let path = prim_path_arg(path)?;

        {
            let mut state = self.state.write();
            if !state.prims.contains_key(&path) {
                return Ok(false);
            }
            state.prims.retain(|prim, _| !prim.has_prefix(&path));
        }

        self.emit(&StageNotice::ObjectsChanged(ObjectsChangedEvent::resync(path)))?;
        self.emit(&StageNotice::StageContentsChanged)?;
        Ok(true)
    }

    pub fn set_metadata(&self, path: impl AsScenePath, key: &str, value: impl Into<Value>) -> Result<()> {
        let path = prim_path_arg(path)?;

        {
            let mut state = self.state.write();
            let prim = state
                .prims
                .get_mut(&path)
                .ok_or_else(|| StageError::PrimNotFound(path.clone()))?;
            prim.metadata.insert(key.to_string(), value.into());
        }

        self.emit(&StageNotice::ObjectsChanged(ObjectsChangedEvent::info_only(path, key)))?;
        self.emit(&StageNotice::StageContentsChanged)
    }

    /// Set the default value of a property on an existing prim
    pub fn set_property(&self, path: impl AsScenePath, name: &str, value: impl Into<Value>) -> Result<()> {
        let path = prim_path_arg(path)?;
        let property = path.append_property(name)?;

        {
            let mut state = self.state.write();
            let prim = state
                .prims
                .get_mut(&path)
                .ok_or_else(|| StageError::PrimNotFound(path.clone()))?;
            prim.properties.insert(name.to_string(), value.into());
        }

        self.emit(&StageNotice::ObjectsChanged(ObjectsChangedEvent::info_only(property, "default")))?;
        self.emit(&StageNotice::StageContentsChanged)
    }

    /// Append a sublayer to the layer stack
    pub fn add_sublayer(&self, identifier: impl Into<String>) -> Result<()> {
        let identifier = identifier.into();

        {
            let mut state = self.state.write();
            if identifier == self.root_layer || state.sublayers.contains(&identifier) {
                return Err(StageError::InvalidLayerOperation(format!(
                    "layer '{}' is already in the layer stack",
                    identifier
                )));
            }
            state.sublayers.push(identifier);
        }

        let event = ObjectsChangedEvent::resync(ScenePath::absolute_root());
        self.emit(&StageNotice::ObjectsChanged(event))?;
        self.emit(&StageNotice::StageContentsChanged)
    }

    pub fn mute_layer(&self, identifier: &str) -> Result<()> {
        self.mute_and_unmute_layers::<&str, &str>(&[identifier], &[])
    }

    pub fn unmute_layer(&self, identifier: &str) -> Result<()> {
        self.mute_and_unmute_layers::<&str, &str>(&[], &[identifier])
    }

    /// Mute then unmute layers in one operation.
    ///
    /// Only layers whose state actually changes are reported. Nothing is
    /// emitted when no layer changed.
    pub fn mute_and_unmute_layers<M, U>(&self, mute: &[M], unmute: &[U]) -> Result<()>
    where
        M: AsRef<str>,
        U: AsRef<str>,
    {
        if mute.iter().any(|layer| layer.as_ref() == self.root_layer) {
            return Err(StageError::InvalidLayerOperation(format!(
                "the root layer '{}' cannot be muted",
                self.root_layer
            )));
        }

        let (muted, unmuted) = {
            let mut state = self.state.write();
            let mut muted = Vec::new();
            let mut unmuted = Vec::new();

            for layer in mute.iter().map(AsRef::as_ref) {
                if !state.muted.iter().any(|m| m == layer) {
                    state.muted.push(layer.to_string());
                    muted.push(layer.to_string());
                }
            }
            for layer in unmute.iter().map(AsRef::as_ref) {
                if let Some(index) = state.muted.iter().position(|m| m == layer) {
                    state.muted.remove(index);
                    unmuted.push(layer.to_string());
                }
            }
            (muted, unmuted)
        };

        if muted.is_empty() && unmuted.is_empty() {
            return Ok(());
        }

        self.emit(&StageNotice::LayerMutingChanged { muted, unmuted })?;
        self.emit(&StageNotice::StageContentsChanged)
    }

    /// Point edits at another layer of the stack
    pub fn set_edit_target(&self, layer: &str) -> Result<()> {
        {
            let mut state = self.state.write();
            let in_stack = layer == self.root_layer || state.sublayers.iter().any(|l| l == layer);
            if !in_stack {
                return Err(StageError::LayerNotFound(layer.to_string()));
            }
            if state.edit_target == layer {
                return Ok(());
            }
            state.edit_target = layer.to_string();
        }

        self.emit(&StageNotice::StageEditTargetChanged {
            layer: layer.to_string(),
        })
    }

    /// Register a listener for every notice this stage emits
    pub fn register<F>(&self, listener: F) -> ListenerKey
    where
        F: Fn(&StageNotice) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        let key = ListenerKey(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((key, Arc::new(listener)));
        key
    }

    /// Remove a listener. Returns `false` if the key was unknown.
    pub fn revoke(&self, key: ListenerKey) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(k, _)| *k != key);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn emit(&self, notice: &StageNotice) -> Result<()> {
        log::trace!("{} emits {}", self.id, notice.kind());
        let listeners: Vec<StageListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(notice).map_err(StageError::Listener)?;
        }
        Ok(())
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        if let Err(err) = self.emit(&StageNotice::StageClosing) {
            log::warn!("Listener failed while closing {}: {}", self.id, err);
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("root_layer", &self.root_layer)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn prim_path_arg(path: impl AsScenePath) -> Result<ScenePath> {
    let path = path.to_scene_path()?;
    if path.is_absolute_root() || path.is_property_path() {
        return Err(StageError::InvalidPath {
            path: path.to_string(),
            reason: "expected a prim path",
        });
    }
    Ok(path)
}
