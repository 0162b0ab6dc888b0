//! Broker registry
//!
//! Maps each live stage to its broker. The registry only holds brokers;
//! brokers hold their stage weakly, so registration never keeps a stage
//! alive. Entries whose stage expired are swept on every lookup.

use crate::broker::Broker;
use crate::config::BrokerConfig;
use notice_stage::{Stage, StageId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub struct BrokerRegistry {
    brokers: Mutex<HashMap<StageId, Arc<Broker>>>,
}

impl BrokerRegistry {
    fn new() -> Self {
        Self {
            brokers: Mutex::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static BrokerRegistry {
        static REGISTRY: OnceLock<BrokerRegistry> = OnceLock::new();
        REGISTRY.get_or_init(BrokerRegistry::new)
    }

    /// Existing broker for `stage`, or a new one built with `config`
    pub fn get_or_create(&self, stage: &Arc<Stage>, config: BrokerConfig) -> Arc<Broker> {
        let (broker, expired) = {
            let mut brokers = self.brokers.lock();

            let expired_ids: Vec<StageId> = brokers
                .iter()
                .filter(|(_, broker)| broker.stage().is_none())
                .map(|(id, _)| *id)
                .collect();
            let expired: Vec<Arc<Broker>> = expired_ids
                .iter()
                .filter_map(|id| brokers.remove(id))
                .collect();

            let broker = brokers
                .entry(stage.id())
                .or_insert_with(|| Broker::build(stage, config))
                .clone();
            (broker, expired)
        };

        if !expired.is_empty() {
            log::debug!("Swept {} broker(s) of expired stages", expired.len());
        }
        drop(expired);
        broker
    }

    pub fn get(&self, id: StageId) -> Option<Arc<Broker>> {
        self.brokers.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.brokers.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.brokers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.brokers.lock().is_empty()
    }

    /// Remove the entry for `id` when `predicate` accepts its broker
    pub fn remove_if<F>(&self, id: StageId, predicate: F) -> Option<Arc<Broker>>
    where
        F: FnOnce(&Arc<Broker>) -> bool,
    {
        let mut brokers = self.brokers.lock();
        match brokers.get(&id) {
            Some(broker) if predicate(broker) => brokers.remove(&id),
            _ => None,
        }
    }

    pub fn remove(&self, id: StageId) -> Option<Arc<Broker>> {
        self.brokers.lock().remove(&id)
    }

    /// Drop every registered broker
    pub fn clear(&self) {
        let brokers: Vec<Arc<Broker>> = self.brokers.lock().drain().map(|(_, b)| b).collect();
        log::debug!("Cleared {} broker(s)", brokers.len());
    }
}
