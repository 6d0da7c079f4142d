//! Error types for jalse-engine

use crate::state::EngineState;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised synchronously by engine and scheduler operations
///
/// Failures inside an action body are never reported through this type:
/// they are contained and logged at the worker boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// The engine has been stopped; it can no longer tick or accept work
    #[error("engine is shut down")]
    Shutdown,

    /// Requested state change is not allowed from the current state
    #[error("illegal engine state transition from {from} to {to}")]
    IllegalTransition { from: EngineState, to: EngineState },

    /// The actor is not bound to an engine (never attached, or killed)
    #[error("actor is not attached to an engine")]
    Detached,

    /// Configuration rejected at engine construction
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Failed to spawn the control thread or a worker thread
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl Error {
    /// True for errors that mean the engine is (or has become) unusable
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::Shutdown)
    }
}

fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
