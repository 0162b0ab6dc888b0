//! Dispatchers
//!
//! A dispatcher listens to low-level stage notices and turns them into
//! broker notices. Every broker starts with a [`StageDispatcher`]; hosts can
//! add their own or replace it under the same identifier.

use crate::broker::Broker;
use crate::notice::Notice;
use notice_stage::{ListenerKey as StageListenerKey, Stage};
use std::sync::{Arc, Weak};

/// Bridge from a stage to a broker
pub trait Dispatcher: Send + Sync {
    /// Name used to replace or look up the dispatcher
    fn identifier(&self) -> &str;

    /// Start listening to `stage` on behalf of `broker`
    fn register(&mut self, broker: &Arc<Broker>, stage: &Arc<Stage>);

    /// Stop listening
    fn revoke(&mut self);
}

/// Forwards every stage notice that has a broker counterpart
#[derive(Default)]
pub struct StageDispatcher {
    stage: Weak<Stage>,
    key: Option<StageListenerKey>,
}

impl StageDispatcher {
    pub const IDENTIFIER: &'static str = "StageDispatcher";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Dispatcher for StageDispatcher {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    fn register(&mut self, broker: &Arc<Broker>, stage: &Arc<Stage>) {
        self.revoke();

        let broker = Arc::downgrade(broker);
        let key = stage.register(move |stage_notice| {
            let Some(broker) = broker.upgrade() else {
                return Ok(());
            };
            if let Some(notice) = Notice::from_stage(stage_notice) {
                broker.send(notice)?;
            }
            Ok(())
        });

        self.stage = Arc::downgrade(stage);
        self.key = Some(key);
    }

    fn revoke(&mut self) {
        if let Some(key) = self.key.take() {
            if let Some(stage) = self.stage.upgrade() {
                stage.revoke(key);
            }
        }
    }
}

impl Drop for StageDispatcher {
    fn drop(&mut self) {
        self.revoke();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoke_detaches_from_stage() {
        let stage = Stage::create_in_memory();
        let broker = Broker::create(&stage);
        let before = stage.listener_count();

        let mut dispatcher = StageDispatcher::new();
        dispatcher.register(&broker, &stage);
        assert_eq!(stage.listener_count(), before + 1);

        dispatcher.revoke();
        assert_eq!(stage.listener_count(), before);
    }
}
