//! Notice batching
//!
//! A batch holds notices of one kind in arrival order and can collapse
//! them into the minimal equivalent set.

use crate::error::{BrokerError, Result};
use crate::kind::NoticeKind;
use crate::notice::Notice;

/// Notices of a single kind awaiting merge or delivery
#[derive(Debug, Clone)]
pub struct NoticeBatch {
    kind: NoticeKind,
    notices: Vec<Notice>,
    stats: BatchStats,
}

/// Counters describing what merging did to a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Notices added since the batch was created or cleared
    pub original_count: usize,
    /// Notices folded into an earlier one
    pub merged_count: usize,
}

impl NoticeBatch {
    pub fn new(kind: NoticeKind) -> Self {
        Self {
            kind,
            notices: Vec::new(),
            stats: BatchStats::default(),
        }
    }

    pub fn kind(&self) -> &NoticeKind {
        &self.kind
    }

    /// Append a notice, checking its kind
    pub fn add(&mut self, notice: Notice) -> Result<()> {
        if notice.kind() != self.kind {
            return Err(BrokerError::InvalidArgument(format!(
                "{} notice added to a {} batch",
                notice.kind(),
                self.kind
            )));
        }
        self.push(notice);
        Ok(())
    }

    pub(crate) fn push(&mut self, notice: Notice) {
        self.notices.push(notice);
        self.stats.original_count += 1;
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Collapse a mergeable batch into a single notice.
    ///
    /// Batches of non-mergeable kinds, and batches with fewer than two
    /// notices, are left untouched.
    pub fn merge_all(&mut self) {
        if self.notices.len() < 2 || !self.notices[0].is_mergeable() {
            return;
        }

        let mut notices = std::mem::take(&mut self.notices).into_iter();
        if let Some(mut merged) = notices.next() {
            // Every notice shares the batch kind, checked on insertion.
            for notice in notices {
                merged.fold(notice);
                self.stats.merged_count += 1;
            }
            self.notices.push(merged);
        }
    }

    pub fn clear(&mut self) {
        self.notices.clear();
        self.stats = BatchStats::default();
    }

    pub(crate) fn into_notices(self) -> Vec<Notice> {
        self.notices
    }
}
