//! Notice cache
//!
//! Collects every notice of one kind delivered for a stage, whether or not
//! a transaction is open, until the cache is cleared or dropped. The cache
//! listens on the stage rather than on one broker instance, so it keeps
//! collecting after the stage's broker is reset and recreated.

use crate::batch::NoticeBatch;
use crate::error::Result;
use crate::kind::{NoticeKind, NoticeTypeRef};
use crate::listener::{ListenerKey, StageListeners};
use crate::notice::Notice;
use crate::notice_registry::NoticeRegistry;
use crate::transaction::IntoBroker;
use notice_stage::StageId;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct NoticeCache {
    kind: NoticeKind,
    stage_id: Option<StageId>,
    batch: Arc<Mutex<NoticeBatch>>,
    key: ListenerKey,
}

impl NoticeCache {
    /// Start caching notices of `kind` delivered for the stage of `target`.
    ///
    /// Fails with `InvalidArgument` when `kind` is not a concrete broker
    /// notice kind.
    pub fn new(target: impl IntoBroker, kind: impl Into<NoticeTypeRef>) -> Result<Self> {
        let kind = NoticeRegistry::global().resolve(kind)?;
        let stage_id = target.into_broker().stage_id();
        Ok(Self::attach(Some(stage_id), kind))
    }

    /// Cache notices of `kind` delivered for any stage
    pub fn for_all_stages(kind: impl Into<NoticeTypeRef>) -> Result<Self> {
        let kind = NoticeRegistry::global().resolve(kind)?;
        Ok(Self::attach(None, kind))
    }

    fn attach(stage_id: Option<StageId>, kind: NoticeKind) -> Self {
        let batch = Arc::new(Mutex::new(NoticeBatch::new(kind.clone())));
        let sink = Arc::clone(&batch);
        let key = StageListeners::global().insert(stage_id, kind.clone(), move |notice| {
            sink.lock().push(notice.clone());
            Ok(())
        });

        Self {
            kind,
            stage_id,
            batch,
            key,
        }
    }

    pub fn kind(&self) -> &NoticeKind {
        &self.kind
    }

    /// Stage this cache listens to; `None` for every stage
    pub fn stage_id(&self) -> Option<StageId> {
        self.stage_id
    }

    /// Number of cached notices
    pub fn size(&self) -> usize {
        self.batch.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.lock().is_empty()
    }

    /// Cached notices in arrival order
    pub fn get_all(&self) -> Vec<Notice> {
        self.batch.lock().notices().to_vec()
    }

    /// Collapse cached notices of a mergeable kind into one
    pub fn merge_all(&self) {
        self.batch.lock().merge_all();
    }

    pub fn clear(&self) {
        self.batch.lock().clear();
    }
}

impl Drop for NoticeCache {
    fn drop(&mut self) {
        StageListeners::global().remove(self.key);
    }
}
