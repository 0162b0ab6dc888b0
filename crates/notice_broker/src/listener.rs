//! Downstream listeners
//!
//! Listeners subscribe to one notice kind, or to every kind, on a single
//! broker. Stage listeners are keyed on a stage id instead and outlive any
//! one broker for that stage. Delivery clones the matching callbacks out of
//! both tables first so callbacks can re-enter the broker.

use crate::broker::Broker;
use crate::kind::NoticeKind;
use crate::notice::Notice;
use crossbeam_channel::{Receiver, Sender};
use notice_stage::{ListenerError, StageId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Handle returned when registering a listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerKey(pub u64);

pub(crate) type NoticeCallback = Arc<dyn Fn(&Notice) -> Result<(), ListenerError> + Send + Sync>;

struct ListenerEntry {
    key: ListenerKey,
    kind: Option<NoticeKind>,
    callback: NoticeCallback,
}

#[derive(Default)]
pub(crate) struct ListenerTable {
    entries: Vec<ListenerEntry>,
    next_key: u64,
}

impl ListenerTable {
    pub(crate) fn insert(&mut self, kind: Option<NoticeKind>, callback: NoticeCallback) -> ListenerKey {
        self.next_key += 1;
        let key = ListenerKey(self.next_key);
        self.entries.push(ListenerEntry { key, kind, callback });
        key
    }

    pub(crate) fn remove(&mut self, key: ListenerKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.key != key);
        self.entries.len() != before
    }

    /// Callbacks interested in `kind`, in registration order
    pub(crate) fn matching(&self, kind: &NoticeKind) -> Vec<NoticeCallback> {
        self.entries
            .iter()
            .filter(|entry| entry.kind.as_ref().map_or(true, |k| k == kind))
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

struct StageListenerEntry {
    key: ListenerKey,
    /// `None` listens to every stage
    stage: Option<StageId>,
    kind: NoticeKind,
    callback: NoticeCallback,
}

/// Process-wide listeners keyed on stages rather than broker instances
pub(crate) struct StageListeners {
    entries: RwLock<Vec<StageListenerEntry>>,
    next_key: AtomicU64,
}

impl StageListeners {
    pub(crate) fn global() -> &'static StageListeners {
        static LISTENERS: OnceLock<StageListeners> = OnceLock::new();
        LISTENERS.get_or_init(|| StageListeners {
            entries: RwLock::new(Vec::new()),
            next_key: AtomicU64::new(1),
        })
    }

    pub(crate) fn insert<F>(&self, stage: Option<StageId>, kind: NoticeKind, callback: F) -> ListenerKey
    where
        F: Fn(&Notice) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let key = ListenerKey(self.next_key.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push(StageListenerEntry {
            key,
            stage,
            kind,
            callback: Arc::new(callback),
        });
        key
    }

    pub(crate) fn remove(&self, key: ListenerKey) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.key != key);
        entries.len() != before
    }

    /// Callbacks for `kind` coming from `stage`, in registration order
    pub(crate) fn matching(&self, stage: StageId, kind: &NoticeKind) -> Vec<NoticeCallback> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.kind == *kind && entry.stage.map_or(true, |id| id == stage))
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: ListenerKey) -> bool {
        self.entries.read().iter().any(|entry| entry.key == key)
    }
}

/// Channel-backed listener created by [`Broker::subscribe`].
///
/// The listener is revoked when the subscription is dropped.
pub struct Subscription {
    key: ListenerKey,
    receiver: Receiver<Notice>,
    broker: Weak<Broker>,
}

impl Subscription {
    pub(crate) fn new(key: ListenerKey, receiver: Receiver<Notice>, broker: Weak<Broker>) -> Self {
        Self {
            key,
            receiver,
            broker,
        }
    }

    pub(crate) fn channel() -> (Sender<Notice>, Receiver<Notice>) {
        crossbeam_channel::unbounded()
    }

    pub fn key(&self) -> ListenerKey {
        self.key
    }

    pub fn try_recv(&self) -> Option<Notice> {
        self.receiver.try_recv().ok()
    }

    pub fn try_iter(&self) -> impl Iterator<Item = Notice> + '_ {
        self.receiver.try_iter()
    }

    /// Take every notice received so far
    pub fn drain(&self) -> Vec<Notice> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn receiver(&self) -> &Receiver<Notice> {
        &self.receiver
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broker) = self.broker.upgrade() {
            broker.revoke(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> NoticeCallback {
        Arc::new(|_: &Notice| Ok(()))
    }

    #[test]
    fn test_matching_by_kind() {
        let mut table = ListenerTable::default();
        table.insert(Some(NoticeKind::ObjectsChanged), noop());
        table.insert(None, noop());
        table.insert(Some(NoticeKind::StageContentsChanged), noop());

        assert_eq!(table.matching(&NoticeKind::ObjectsChanged).len(), 2);
        assert_eq!(table.matching(&NoticeKind::LayerMutingChanged).len(), 1);
    }

    #[test]
    fn test_stage_listeners_filter_by_stage() {
        let listeners = StageListeners::global();
        let stage = notice_stage::Stage::create_in_memory();
        let other = notice_stage::Stage::create_in_memory();
        let kind = NoticeKind::custom("ListenerTest.Scoped");

        let scoped = listeners.insert(Some(stage.id()), kind.clone(), |_| Ok(()));
        let everywhere = listeners.insert(None, kind.clone(), |_| Ok(()));

        assert_eq!(listeners.matching(stage.id(), &kind).len(), 2);
        assert_eq!(listeners.matching(other.id(), &kind).len(), 1);
        assert!(listeners.matching(stage.id(), &NoticeKind::ObjectsChanged).is_empty());

        assert!(listeners.remove(scoped));
        assert!(!listeners.contains(scoped));
        assert_eq!(listeners.matching(stage.id(), &kind).len(), 1);
        listeners.remove(everywhere);
    }

    #[test]
    fn test_remove() {
        let mut table = ListenerTable::default();
        let key = table.insert(None, noop());
        assert!(table.remove(key));
        assert!(!table.remove(key));
        assert_eq!(table.len(), 0);
    }
}
