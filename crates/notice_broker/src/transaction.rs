//! Scoped transactions and blockers
//!
//! Guards open a transaction on construction and close it when dropped,
//! including while unwinding.

use crate::broker::Broker;
use crate::error::Result;
use crate::predicate::CapturePredicate;
use notice_stage::Stage;
use std::sync::Arc;

/// Anything a guard can resolve to a broker
pub trait IntoBroker {
    fn into_broker(self) -> Arc<Broker>;
}

impl IntoBroker for Arc<Broker> {
    fn into_broker(self) -> Arc<Broker> {
        self
    }
}

impl IntoBroker for &Arc<Broker> {
    fn into_broker(self) -> Arc<Broker> {
        Arc::clone(self)
    }
}

impl IntoBroker for &Arc<Stage> {
    fn into_broker(self) -> Arc<Broker> {
        Broker::create(self)
    }
}

/// Transaction open for the lifetime of the guard
#[must_use = "the transaction ends as soon as the guard is dropped"]
pub struct NoticeTransaction {
    broker: Arc<Broker>,
    active: bool,
}

impl NoticeTransaction {
    pub fn new(target: impl IntoBroker) -> Self {
        Self::with_predicate(target, CapturePredicate::Default)
    }

    pub fn with_predicate(target: impl IntoBroker, predicate: CapturePredicate) -> Self {
        let broker = target.into_broker();
        broker.begin_transaction_with(predicate);
        Self {
            broker,
            active: true,
        }
    }

    /// Run `f` inside a transaction and flush afterwards
    pub fn run<T, F>(target: impl IntoBroker, f: F) -> Result<T>
    where
        F: FnOnce() -> T,
    {
        let transaction = Self::new(target);
        let value = f();
        transaction.commit()?;
        Ok(value)
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// End the transaction now, reporting listener errors from the flush
    pub fn commit(mut self) -> Result<()> {
        self.active = false;
        self.broker.end_transaction()
    }
}

impl Drop for NoticeTransaction {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(err) = self.broker.end_transaction() {
            log::error!("Failed to end transaction on {}: {}", self.broker.stage_id(), err);
        }
    }
}

/// Discards every notice for the lifetime of the guard
#[must_use = "the blocker is lifted as soon as the guard is dropped"]
pub struct NoticeBlocker {
    transaction: NoticeTransaction,
}

impl NoticeBlocker {
    pub fn new(target: impl IntoBroker) -> Self {
        Self {
            transaction: NoticeTransaction::with_predicate(target, CapturePredicate::BlockAll),
        }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        self.transaction.broker()
    }

    /// Lift the blocker now
    pub fn release(self) -> Result<()> {
        self.transaction.commit()
    }
}
