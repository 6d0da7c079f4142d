//! Error types for jalse-entity

use crate::identity::EntityId;
use crate::value::AttributeType;
use thiserror::Error;

/// Entity and container error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Entity {0} is dead or no longer attached to a container")]
    Detached(EntityId),

    #[error("Entity {0} already exists in this container")]
    DuplicateId(EntityId),

    #[error("Container is full: limit of {limit} entities reached")]
    LimitReached { limit: usize },

    #[error("Type mismatch for attribute '{name}': expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: AttributeType,
        got: AttributeType,
    },

    #[error(transparent)]
    Engine(#[from] jalse_engine::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
