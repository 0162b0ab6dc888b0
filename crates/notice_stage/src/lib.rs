//! # Notice Stage - In-memory scene graph
//!
//! A minimal hierarchical scene store. Every mutation reports what it
//! changed through a fixed, deterministic sequence of low-level notices
//! delivered synchronously to registered listeners.
//!
//! ```text
//! define_prim("/Foo/Bar")
//!   ├──► ObjectsChanged { resynced: [/Foo] }   ──► StageContentsChanged
//!   └──► ObjectsChanged { resynced: [/Foo/Bar] } ──► StageContentsChanged
//! ```

pub mod error;
pub mod notice;
pub mod path;
pub mod stage;
pub mod value;

pub use error::{ListenerError, Result, StageError};
pub use notice::{ObjectsChangedEvent, StageNotice, StageNoticeKind};
pub use path::{AsScenePath, ScenePath};
pub use stage::{ListenerKey, Stage, StageId};
pub use value::Value;
