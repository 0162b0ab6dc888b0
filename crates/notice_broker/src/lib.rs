//! # Notice Broker - Transactional stage notices
//!
//! Sits between a [`Stage`](notice_stage::Stage) and the code observing it.
//! Low-level stage notices are translated into broker notices which can be
//! batched inside transactions, filtered, merged and delivered once when the
//! outermost transaction ends.
//!
//! ```text
//! Stage ──► Dispatcher ──► Broker ──► filter stack ──► pending batches
//!                                                          │
//!      listeners / caches ◄── merge ◄── broadcasters ◄───┘ (end of transaction)
//! ```
//!
//! ## Key Concepts
//!
//! - **Notice**: one observable change, of a built-in or custom kind
//! - **Transaction**: a scope whose notices are merged and delivered at the end
//! - **CapturePredicate**: decides whether a notice is captured, discarded or
//!   passed through while a transaction is open
//! - **NoticeCache**: collects delivered notices of one kind for inspection
//! - **Broadcaster**: derives further notices from each flush, such as the
//!   prim summary of [`HierarchyBroadcaster`]

pub mod batch;
pub mod broadcaster;
pub mod broker;
pub mod cache;
pub mod config;
pub mod custom;
pub mod dispatcher;
pub mod error;
pub mod hierarchy;
pub mod kind;
pub mod layer_muting;
pub mod listener;
pub mod notice;
pub mod notice_registry;
pub mod objects_changed;
pub mod predicate;
pub mod registry;
pub mod transaction;

pub use batch::{BatchStats, NoticeBatch};
pub use broadcaster::{BroadcastContext, Broadcaster};
pub use broker::Broker;
pub use cache::NoticeCache;
pub use config::BrokerConfig;
pub use custom::CustomNotice;
pub use dispatcher::{Dispatcher, StageDispatcher};
pub use error::{BrokerError, Result};
pub use hierarchy::{HierarchyBroadcaster, HierarchyCache, HierarchyChanged};
pub use kind::{NoticeKind, NoticeTypeRef};
pub use layer_muting::LayerMutingChanged;
pub use listener::{ListenerKey, Subscription};
pub use notice::Notice;
pub use notice_registry::NoticeRegistry;
pub use objects_changed::ObjectsChanged;
pub use predicate::{CaptureDecision, CapturePredicate};
pub use registry::BrokerRegistry;
pub use transaction::{IntoBroker, NoticeBlocker, NoticeTransaction};
