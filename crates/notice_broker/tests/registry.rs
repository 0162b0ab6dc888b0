//! Broker registry lifetime

use notice_broker::{Broker, BrokerRegistry, NoticeTransaction, StageDispatcher};
use notice_stage::Stage;
use std::sync::Arc;

#[test]
fn test_create_twice_returns_same_broker() {
    let stage = Stage::create_in_memory();
    let first = Broker::create(&stage);
    let second = Broker::create(&stage);
    assert!(Arc::ptr_eq(&first, &second));

    let other = Broker::create(&Stage::create_in_memory());
    assert!(!Arc::ptr_eq(&first, &other));
}

#[test]
fn test_registry_does_not_keep_stage_alive() {
    let stage = Stage::create_in_memory();
    let id = stage.id();
    let broker = Broker::create(&stage);
    assert!(BrokerRegistry::global().contains(id));

    drop(stage);

    assert!(broker.stage().is_none());
    assert!(!BrokerRegistry::global().contains(id));
}

#[test]
fn test_reset_forgets_the_broker() {
    let stage = Stage::create_in_memory();
    let broker = Broker::create(&stage);
    broker.reset();
    assert!(!BrokerRegistry::global().contains(stage.id()));

    let fresh = Broker::create(&stage);
    assert!(!Arc::ptr_eq(&broker, &fresh));
}

#[test]
fn test_dropped_broker_detaches_from_stage() {
    let stage = Stage::create_in_memory();
    let before = stage.listener_count();

    let broker = Broker::create(&stage);
    assert!(stage.listener_count() > before);
    broker.reset();
    drop(broker);

    assert_eq!(stage.listener_count(), before);
}

#[test]
fn test_default_dispatcher_is_installed() {
    let stage = Stage::create_in_memory();
    let broker = Broker::create(&stage);
    assert!(broker.has_dispatcher(StageDispatcher::IDENTIFIER));
    assert_eq!(broker.dispatcher_identifiers(), vec![StageDispatcher::IDENTIFIER.to_string()]);
}

#[test]
fn test_replacing_a_dispatcher_keeps_one_bridge() {
    let stage = Stage::create_in_memory();
    let broker = Broker::create(&stage);
    let listeners = stage.listener_count();

    broker.add_dispatcher(Box::new(StageDispatcher::new())).unwrap();

    assert_eq!(stage.listener_count(), listeners);
    assert_eq!(broker.dispatcher_identifiers().len(), 1);
}

#[test]
fn test_guard_on_stage_uses_registered_broker() {
    let stage = Stage::create_in_memory();
    let broker = Broker::create(&stage);
    let transaction = NoticeTransaction::new(&stage);
    assert!(Arc::ptr_eq(transaction.broker(), &broker));
    assert!(broker.is_in_transaction());
}
