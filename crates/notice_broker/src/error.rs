//! Error types for the notice broker

use notice_stage::{ListenerError, StageError};
use thiserror::Error;

/// Broker errors
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Bad notice kind, filter or merge operand
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not allowed in the current transaction state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A downstream listener failed during delivery
    #[error("Notice listener failed: {0}")]
    Listener(#[source] ListenerError),

    /// Error raised by the underlying stage
    #[error(transparent)]
    Stage(#[from] StageError),

    /// Malformed broker configuration
    #[error("Invalid broker configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl BrokerError {
    pub(crate) fn not_a_broker_notice(type_name: &str) -> Self {
        Self::InvalidArgument(format!(
            "expecting a notice derived from the broker StageNotice root, got '{}'",
            type_name
        ))
    }
}

/// Result type for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;
