//! Notice broker
//!
//! One broker exists per stage. Outside a transaction it forwards notices
//! straight to its listeners. Inside one, the predicate on top of the filter
//! stack captures, discards or passes each notice through; captured notices
//! are grouped per kind and flushed once the outermost transaction ends.
//! Every flush merges each kind, runs the broadcasters over the result and
//! delivers to broker listeners followed by stage listeners.
//!
//! ```text
//! Stage ──► StageDispatcher ──► Broker::send ──┬──► flush          (depth 0)
//!                                              └──► filter stack   (depth ≥ 1)
//!                                                     ├─ Capture ──► pending batches ──► flush
//!                                                     ├─ Discard
//!                                                     └─ PassThrough ──► listeners
//!
//! flush: merge ──► broadcasters ──► merge ──► listeners
//! ```

use crate::batch::NoticeBatch;
use crate::broadcaster::{execution_order, BroadcastContext, Broadcaster};
use crate::config::BrokerConfig;
use crate::dispatcher::{Dispatcher, StageDispatcher};
use crate::error::{BrokerError, Result};
use crate::kind::NoticeTypeRef;
use crate::listener::{ListenerKey, ListenerTable, NoticeCallback, StageListeners, Subscription};
use crate::notice::Notice;
use crate::notice_registry::NoticeRegistry;
use crate::predicate::{CaptureDecision, CapturePredicate};
use crate::registry::BrokerRegistry;
use notice_stage::{ListenerError, ListenerKey as StageListenerKey, Stage, StageId, StageNotice};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOrigin {
    Transaction,
    Explicit,
}

struct FilterEntry {
    predicate: CapturePredicate,
    origin: FilterOrigin,
}

#[derive(Default)]
struct TransactionState {
    depth: usize,
    filters: Vec<FilterEntry>,
    /// One batch per kind, in order of first capture
    pending: Vec<NoticeBatch>,
}

impl TransactionState {
    fn capture(&mut self, notice: Notice) {
        append(&mut self.pending, notice);
    }
}

/// Add `notice` to the batch of its kind, opening one at the end if needed
fn append(batches: &mut Vec<NoticeBatch>, notice: Notice) {
    let kind = notice.kind();
    match batches.iter_mut().find(|batch| *batch.kind() == kind) {
        Some(batch) => batch.push(notice),
        None => {
            let mut batch = NoticeBatch::new(kind);
            batch.push(notice);
            batches.push(batch);
        }
    }
}

/// Transactional notice broker bound to one stage
pub struct Broker {
    stage_id: StageId,
    stage: Weak<Stage>,
    config: BrokerConfig,
    state: Mutex<TransactionState>,
    listeners: RwLock<ListenerTable>,
    dispatchers: Mutex<Vec<Box<dyn Dispatcher>>>,
    broadcasters: Mutex<Vec<Box<dyn Broadcaster>>>,
    closing_key: Mutex<Option<StageListenerKey>>,
}

impl Broker {
    /// Broker for `stage`, created on first use.
    ///
    /// Calling this again for the same stage returns the same broker.
    pub fn create(stage: &Arc<Stage>) -> Arc<Broker> {
        BrokerRegistry::global().get_or_create(stage, BrokerConfig::default())
    }

    /// Like [`Broker::create`]; `config` only applies if the broker does
    /// not exist yet
    pub fn create_with_config(stage: &Arc<Stage>, config: BrokerConfig) -> Arc<Broker> {
        BrokerRegistry::global().get_or_create(stage, config)
    }

    pub(crate) fn build(stage: &Arc<Stage>, config: BrokerConfig) -> Arc<Broker> {
        let broker = Arc::new(Self {
            stage_id: stage.id(),
            stage: Arc::downgrade(stage),
            config,
            state: Mutex::new(TransactionState::default()),
            listeners: RwLock::new(ListenerTable::default()),
            dispatchers: Mutex::new(Vec::new()),
            broadcasters: Mutex::new(Vec::new()),
            closing_key: Mutex::new(None),
        });

        let weak = Arc::downgrade(&broker);
        let stage_id = stage.id();
        let key = stage.register(move |notice| {
            if matches!(notice, StageNotice::StageClosing) {
                BrokerRegistry::global()
                    .remove_if(stage_id, |existing| Arc::as_ptr(existing) == Weak::as_ptr(&weak));
            }
            Ok(())
        });
        *broker.closing_key.lock() = Some(key);

        broker.install_dispatcher(Box::new(StageDispatcher::new()), stage);
        log::debug!("Created broker for {}", stage_id);
        broker
    }

    /// Drop this broker from the registry. The next [`Broker::create`] for
    /// the stage builds a fresh one.
    pub fn reset(&self) {
        BrokerRegistry::global().remove_if(self.stage_id, |broker| std::ptr::eq(Arc::as_ptr(broker), self));
    }

    /// Drop every broker from the registry
    pub fn reset_all() {
        BrokerRegistry::global().clear();
    }

    pub fn stage(&self) -> Option<Arc<Stage>> {
        self.stage.upgrade()
    }

    pub fn stage_id(&self) -> StageId {
        self.stage_id
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn is_in_transaction(&self) -> bool {
        self.state.lock().depth > 0
    }

    pub fn transaction_depth(&self) -> usize {
        self.state.lock().depth
    }

    /// Notices captured and not yet flushed
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.iter().map(NoticeBatch::len).sum()
    }

    pub fn begin_transaction(&self) {
        self.begin_transaction_with(CapturePredicate::Default);
    }

    /// Open a transaction filtered by `predicate`.
    ///
    /// Nested transactions share the pending notices of the outermost one.
    pub fn begin_transaction_with(&self, predicate: CapturePredicate) {
        let mut state = self.state.lock();
        if state.depth == 0 {
            state.pending.clear();
        }
        state.depth += 1;
        state.filters.push(FilterEntry {
            predicate,
            origin: FilterOrigin::Transaction,
        });
        log::debug!("Begin transaction on {} (depth {})", self.stage_id, state.depth);
    }

    /// Close the innermost transaction; closing the outermost flushes.
    pub fn end_transaction(&self) -> Result<()> {
        let batches = {
            let mut state = self.state.lock();
            if state.depth == 0 {
                drop(state);
                return self.unmatched("end_transaction");
            }

            while let Some(entry) = state.filters.pop() {
                if entry.origin == FilterOrigin::Transaction {
                    break;
                }
                log::warn!("Discarding filter left on {} at transaction end", self.stage_id);
            }

            state.depth -= 1;
            log::debug!("End transaction on {} (depth {})", self.stage_id, state.depth);
            if state.depth > 0 {
                return Ok(());
            }
            std::mem::take(&mut state.pending)
        };

        log::debug!("Flushing {} notice kind(s) on {}", batches.len(), self.stage_id);
        self.flush(batches)
    }

    /// Layer a filter over the current one without opening a transaction
    pub fn push_filter(&self, predicate: CapturePredicate) -> Result<()> {
        let mut state = self.state.lock();
        if state.depth == 0 {
            return Err(BrokerError::InvalidState(
                "push_filter requires an open transaction".into(),
            ));
        }
        state.filters.push(FilterEntry {
            predicate,
            origin: FilterOrigin::Explicit,
        });
        Ok(())
    }

    /// Remove the filter added by the last [`Broker::push_filter`]
    pub fn pop_filter(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            let top_is_explicit = state
                .filters
                .last()
                .map_or(false, |entry| entry.origin == FilterOrigin::Explicit);
            if top_is_explicit {
                state.filters.pop();
                return Ok(());
            }
        }
        self.unmatched("pop_filter")
    }

    /// Hand a notice to the broker.
    ///
    /// Delivered at once outside transactions, otherwise routed by the top
    /// filter.
    pub fn send(&self, notice: Notice) -> Result<()> {
        if let Notice::Custom(custom) = &notice {
            NoticeRegistry::global().resolve(custom.kind())?;
        }

        let predicate = {
            let state = self.state.lock();
            match state.filters.last() {
                Some(entry) if state.depth > 0 => Some(entry.predicate.clone()),
                _ => None,
            }
        };

        let Some(predicate) = predicate else {
            return self.flush_one(notice);
        };

        match predicate.evaluate(&notice) {
            CaptureDecision::Capture => {
                let mut state = self.state.lock();
                if state.depth == 0 {
                    drop(state);
                    return self.flush_one(notice);
                }
                log::trace!("Captured {} on {}", notice.kind(), self.stage_id);
                state.capture(notice);
                Ok(())
            }
            CaptureDecision::Discard => {
                log::trace!("Discarded {} on {}", notice.kind(), self.stage_id);
                Ok(())
            }
            CaptureDecision::PassThrough => self.deliver(&notice),
        }
    }

    /// Listen to one notice kind
    pub fn register<F>(&self, kind: impl Into<NoticeTypeRef>, callback: F) -> Result<ListenerKey>
    where
        F: Fn(&Notice) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        let kind = NoticeRegistry::global().resolve(kind)?;
        Ok(self.listeners.write().insert(Some(kind), Arc::new(callback)))
    }

    /// Listen to every notice
    pub fn register_any<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(&Notice) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.listeners.write().insert(None, Arc::new(callback))
    }

    pub fn revoke(&self, key: ListenerKey) -> bool {
        self.listeners.write().remove(key)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Receive notices of one kind through a channel
    pub fn subscribe(self: &Arc<Self>, kind: impl Into<NoticeTypeRef>) -> Result<Subscription> {
        let (sender, receiver) = Subscription::channel();
        let key = self.register(kind, move |notice| {
            if sender.send(notice.clone()).is_err() {
                log::trace!("Subscription receiver dropped");
            }
            Ok(())
        })?;
        Ok(Subscription::new(key, receiver, Arc::downgrade(self)))
    }

    /// Install a dispatcher, replacing any with the same identifier
    pub fn add_dispatcher(self: &Arc<Self>, dispatcher: Box<dyn Dispatcher>) -> Result<()> {
        let stage = self.stage().ok_or_else(|| {
            BrokerError::InvalidState(format!("{} no longer exists", self.stage_id))
        })?;
        self.install_dispatcher(dispatcher, &stage);
        Ok(())
    }

    fn install_dispatcher(self: &Arc<Self>, mut dispatcher: Box<dyn Dispatcher>, stage: &Arc<Stage>) {
        dispatcher.register(self, stage);

        let replaced = {
            let mut dispatchers = self.dispatchers.lock();
            let existing = dispatchers
                .iter()
                .position(|d| d.identifier() == dispatcher.identifier());
            match existing {
                Some(index) => Some(std::mem::replace(&mut dispatchers[index], dispatcher)),
                None => {
                    dispatchers.push(dispatcher);
                    None
                }
            }
        };

        if let Some(mut old) = replaced {
            log::debug!("Replaced dispatcher '{}' on {}", old.identifier(), self.stage_id);
            old.revoke();
        }
    }

    pub fn has_dispatcher(&self, identifier: &str) -> bool {
        self.dispatchers.lock().iter().any(|d| d.identifier() == identifier)
    }

    pub fn dispatcher_identifiers(&self) -> Vec<String> {
        self.dispatchers
            .lock()
            .iter()
            .map(|d| d.identifier().to_string())
            .collect()
    }

    /// Install a broadcaster, replacing any with the same identifier.
    ///
    /// A broadcaster naming a parent runs after it; the parent must already
    /// be installed.
    pub fn add_broadcaster(&self, broadcaster: Box<dyn Broadcaster>) -> Result<()> {
        let mut broadcasters = self.broadcasters.lock();
        if let Some(parent) = broadcaster.parent_identifier() {
            if parent == broadcaster.identifier() {
                return Err(BrokerError::InvalidArgument(format!(
                    "broadcaster '{}' names itself as parent",
                    parent
                )));
            }
            if !broadcasters.iter().any(|b| b.identifier() == parent) {
                return Err(BrokerError::InvalidArgument(format!(
                    "broadcaster '{}' requires missing parent '{}'",
                    broadcaster.identifier(),
                    parent
                )));
            }
        }

        log::debug!("Installed broadcaster '{}' on {}", broadcaster.identifier(), self.stage_id);
        match broadcasters
            .iter()
            .position(|b| b.identifier() == broadcaster.identifier())
        {
            Some(index) => broadcasters[index] = broadcaster,
            None => broadcasters.push(broadcaster),
        }
        Ok(())
    }

    pub fn has_broadcaster(&self, identifier: &str) -> bool {
        self.broadcasters.lock().iter().any(|b| b.identifier() == identifier)
    }

    pub fn broadcaster_identifiers(&self) -> Vec<String> {
        self.broadcasters
            .lock()
            .iter()
            .map(|b| b.identifier().to_string())
            .collect()
    }

    /// Inspect the broadcaster installed under `identifier`. Broadcasters
    /// stay locked while `f` runs, so `f` must not flush this broker.
    pub fn with_broadcaster<R>(&self, identifier: &str, f: impl FnOnce(&dyn Broadcaster) -> R) -> Option<R> {
        let broadcasters = self.broadcasters.lock();
        broadcasters
            .iter()
            .find(|b| b.identifier() == identifier)
            .map(|b| f(b.as_ref()))
    }

    fn flush_one(&self, notice: Notice) -> Result<()> {
        let mut batch = NoticeBatch::new(notice.kind());
        batch.push(notice);
        self.flush(vec![batch])
    }

    fn flush(&self, mut batches: Vec<NoticeBatch>) -> Result<()> {
        batches.iter_mut().for_each(NoticeBatch::merge_all);

        let emitted = self.run_broadcasters(&batches)?;
        if !emitted.is_empty() {
            for notice in emitted {
                append(&mut batches, notice);
            }
            batches.iter_mut().for_each(NoticeBatch::merge_all);
        }

        for batch in batches {
            for mut notice in batch.into_notices() {
                if self.config.prune_descendant_resyncs {
                    if let Notice::ObjectsChanged(objects) = &mut notice {
                        objects.prune_descendant_resyncs();
                    }
                }
                self.deliver(&notice)?;
            }
        }
        Ok(())
    }

    fn run_broadcasters(&self, batches: &[NoticeBatch]) -> Result<Vec<Notice>> {
        let mut broadcasters = self.broadcasters.lock();
        if broadcasters.is_empty() {
            return Ok(Vec::new());
        }

        let mut context = BroadcastContext::new(self.stage(), batches);
        for index in execution_order(&broadcasters) {
            log::trace!("Running broadcaster '{}'", broadcasters[index].identifier());
            broadcasters[index].execute(&mut context)?;
        }
        Ok(context.into_emitted())
    }

    fn deliver(&self, notice: &Notice) -> Result<()> {
        let kind = notice.kind();
        let mut callbacks: Vec<NoticeCallback> = self.listeners.read().matching(&kind);
        callbacks.extend(StageListeners::global().matching(self.stage_id, &kind));
        log::trace!("Delivering {} to {} listener(s)", kind, callbacks.len());

        for callback in callbacks {
            callback(notice).map_err(BrokerError::Listener)?;
        }
        Ok(())
    }

    fn unmatched(&self, operation: &str) -> Result<()> {
        if self.config.strict_nesting {
            return Err(BrokerError::InvalidState(format!(
                "{} without a matching open scope on {}",
                operation, self.stage_id
            )));
        }
        log::warn!("Ignoring unmatched {} on {}", operation, self.stage_id);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pending_kinds(&self) -> Vec<crate::kind::NoticeKind> {
        self.state.lock().pending.iter().map(|b| b.kind().clone()).collect()
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        for dispatcher in self.dispatchers.get_mut().iter_mut() {
            dispatcher.revoke();
        }
        if let (Some(key), Some(stage)) = (self.closing_key.get_mut().take(), self.stage.upgrade()) {
            stage.revoke(key);
        }
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Broker")
            .field("stage_id", &self.stage_id)
            .field("depth", &state.depth)
            .field("filters", &state.filters.len())
            .field("pending", &state.pending.len())
            .field("broadcasters", &self.broadcasters.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::kind::NoticeKind;

    #[test]
    fn test_pending_kinds_follow_first_capture() {
        let stage = Stage::create_in_memory();
        let broker = Broker::create(&stage);

        broker.begin_transaction();
        broker.send(Notice::StageEditTargetChanged).unwrap();
        broker.send(Notice::StageContentsChanged).unwrap();
        broker.send(Notice::StageEditTargetChanged).unwrap();

        assert_eq!(
            broker.pending_kinds(),
            vec![NoticeKind::StageEditTargetChanged, NoticeKind::StageContentsChanged]
        );
        assert_eq!(broker.pending_count(), 3);
        broker.end_transaction().unwrap();
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn test_push_filter_outside_transaction() {
        let stage = Stage::create_in_memory();
        let broker = Broker::create(&stage);
        let err = broker.push_filter(CapturePredicate::BlockAll).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidState(_)));
    }

    #[test]
    fn test_end_transaction_drops_leftover_filters() {
        let stage = Stage::create_in_memory();
        let broker = Broker::create(&stage);

        broker.begin_transaction();
        broker.begin_transaction();
        broker.push_filter(CapturePredicate::BlockAll).unwrap();
        broker.end_transaction().unwrap();

        // The outer transaction's default predicate is back on top.
        broker.send(Notice::StageContentsChanged).unwrap();
        assert_eq!(broker.pending_count(), 1);
        broker.end_transaction().unwrap();
    }

    #[test]
    fn test_pop_filter_never_pops_transaction_predicate() {
        let stage = Stage::create_in_memory();
        let broker = Broker::create_with_config(&stage, BrokerConfig::strict());

        broker.begin_transaction_with(CapturePredicate::BlockAll);
        let err = broker.pop_filter().unwrap_err();
        assert!(matches!(err, BrokerError::InvalidState(_)));
        broker.send(Notice::StageContentsChanged).unwrap();
        assert_eq!(broker.pending_count(), 0);
        broker.end_transaction().unwrap();
    }

    #[test]
    fn test_stage_death_expires_broker() {
        let stage = Stage::create_in_memory();
        let broker = Broker::create(&stage);
        assert!(broker.stage().is_some());
        drop(stage);
        assert!(broker.stage().is_none());
    }
}
