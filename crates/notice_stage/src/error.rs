//! Error types for stage operations

use crate::path::ScenePath;
use thiserror::Error;

/// Error raised by a notice listener callback
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Stage errors
#[derive(Debug, Error)]
pub enum StageError {
    /// Malformed scene path
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// No prim defined at the path
    #[error("Prim not found: {0}")]
    PrimNotFound(ScenePath),

    /// Layer is not part of the layer stack
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// Layer operation that is not allowed on this layer
    #[error("Invalid layer operation: {0}")]
    InvalidLayerOperation(String),

    /// A listener failed while a notice was being emitted
    #[error("Notice listener failed: {0}")]
    Listener(#[source] ListenerError),
}

/// Result type for stage operations
pub type Result<T> = std::result::Result<T, StageError>;
