//! Broadcasters
//!
//! A broadcaster runs whenever the broker flushes. It reads the merged
//! notices of the flush and may derive further notices from them, which are
//! delivered in the same flush. Broadcasters form a tree through
//! [`Broadcaster::parent_identifier`]: roots run in installation order and
//! each is followed by its children.

use crate::batch::NoticeBatch;
use crate::error::Result;
use crate::kind::NoticeKind;
use crate::notice::Notice;
use crate::notice_registry::NoticeRegistry;
use crate::objects_changed::ObjectsChanged;
use notice_stage::Stage;
use std::any::Any;
use std::sync::Arc;

pub trait Broadcaster: Any + Send + Sync {
    /// Unique among the broadcasters of one broker
    fn identifier(&self) -> &str;

    /// Broadcaster this one runs after, if any
    fn parent_identifier(&self) -> Option<&str> {
        None
    }

    fn execute(&mut self, context: &mut BroadcastContext<'_>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Broadcaster {
    pub fn downcast_ref<T: Broadcaster>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

/// Merged notices of one flush, as seen by broadcasters
pub struct BroadcastContext<'a> {
    stage: Option<Arc<Stage>>,
    batches: &'a [NoticeBatch],
    emitted: Vec<Notice>,
}

impl<'a> BroadcastContext<'a> {
    pub(crate) fn new(stage: Option<Arc<Stage>>, batches: &'a [NoticeBatch]) -> Self {
        Self {
            stage,
            batches,
            emitted: Vec::new(),
        }
    }

    /// The flushing broker's stage, unless it has been dropped
    pub fn stage(&self) -> Option<&Arc<Stage>> {
        self.stage.as_ref()
    }

    /// Merged notices of `kind` in this flush
    pub fn notices(&self, kind: &NoticeKind) -> &[Notice] {
        self.batches
            .iter()
            .find(|batch| batch.kind() == kind)
            .map(NoticeBatch::notices)
            .unwrap_or_default()
    }

    pub fn objects_changed(&self) -> Option<&ObjectsChanged> {
        self.notices(&NoticeKind::ObjectsChanged)
            .first()
            .and_then(Notice::as_objects_changed)
    }

    /// Notices sent by broadcasters that already ran in this flush
    pub fn emitted(&self) -> &[Notice] {
        &self.emitted
    }

    /// Add a notice to this flush
    pub fn send(&mut self, notice: Notice) -> Result<()> {
        if let Notice::Custom(custom) = &notice {
            NoticeRegistry::global().resolve(custom.kind())?;
        }
        self.emitted.push(notice);
        Ok(())
    }

    pub(crate) fn into_emitted(self) -> Vec<Notice> {
        self.emitted
    }
}

/// Indices of `broadcasters` with every parent ahead of its children
pub(crate) fn execution_order(broadcasters: &[Box<dyn Broadcaster>]) -> Vec<usize> {
    fn visit(all: &[Box<dyn Broadcaster>], parent: Option<&str>, order: &mut Vec<usize>) {
        for (index, broadcaster) in all.iter().enumerate() {
            if broadcaster.parent_identifier() == parent {
                order.push(index);
                visit(all, Some(broadcaster.identifier()), order);
            }
        }
    }

    let mut order = Vec::with_capacity(broadcasters.len());
    visit(broadcasters, None, &mut order);
    order
}
