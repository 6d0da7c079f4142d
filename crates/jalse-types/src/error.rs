//! Error types for jalse-types
//!
//! Configuration errors come from resolving entity type declarations and are
//! fatal to the affected type. Everything else is raised while calling a
//! method on a proxy and says nothing about the declaration itself.

use crate::decl::{MethodKey, TypeRef};
use jalse_entity::EntityTypeId;
use std::fmt;
use thiserror::Error;

/// Why a single method declaration was rejected by a resolver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MethodError {
    #[error("default methods cannot be bound to a canonical operation")]
    DefaultNotAllowed,

    #[error("expected {expected} parameter(s), got {got}")]
    ParamCount { expected: &'static str, got: usize },

    #[error("parameter {index} must be {expected}, got {got}")]
    ParamType {
        index: usize,
        expected: &'static str,
        got: TypeRef,
    },

    #[error("return type must be {expected}, got {got}")]
    ReturnType { expected: &'static str, got: TypeRef },

    #[error("{0} is not an attribute value type")]
    NotAValueType(TypeRef),

    #[error("no attribute name given and none can be derived from the method name")]
    NoName,

    #[error("entity id given both as a parameter and by annotation")]
    ConflictingIdSources,

    #[error("no entity id source: expected an id parameter or an id annotation")]
    MissingIdSource,

    #[error("a random id cannot be used to look up an existing entity")]
    RandomIdLookup,

    #[error("{field} must not be negative, got {amount}")]
    NegativeAmount { field: &'static str, amount: i64 },
}

/// What went wrong with one method of an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemKind {
    /// No resolver claimed the method
    Unclaimed,
    /// More than one resolver claimed the method
    Ambiguous(Vec<&'static str>),
    /// A resolver claimed the method but rejected its shape
    Invalid {
        resolver: &'static str,
        error: MethodError,
    },
    /// The method hands out or marks an entity type that is not registered
    UnknownType(EntityTypeId),
}

/// One rejected method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodProblem {
    pub method: MethodKey,
    pub kind: ProblemKind,
}

impl fmt::Display for MethodProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ProblemKind::Unclaimed => write!(f, "{}: not claimed by any resolver", self.method),
            ProblemKind::Ambiguous(resolvers) => write!(
                f,
                "{}: claimed by several resolvers ({})",
                self.method,
                resolvers.join(", ")
            ),
            ProblemKind::Invalid { resolver, error } => {
                write!(f, "{}: {} ({})", self.method, error, resolver)
            }
            ProblemKind::UnknownType(ty) => {
                write!(f, "{}: refers to unknown entity type {}", self.method, ty)
            }
        }
    }
}

fn join_problems(problems: &[MethodProblem]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_path(path: &[EntityTypeId]) -> String {
    path.iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Entity type declaration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown entity type: {0}")]
    UnknownType(EntityTypeId),

    #[error("Entity type already registered: {0}")]
    AlreadyRegistered(EntityTypeId),

    #[error("Cyclic entity type inheritance: {}", join_path(.0))]
    CyclicInheritance(Vec<EntityTypeId>),

    #[error("Entity type {ty} has invalid methods: {}", join_problems(.problems))]
    InvalidMethods {
        ty: EntityTypeId,
        problems: Vec<MethodProblem>,
    },
}

/// Entity type error
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Entity type {ty} has no method named '{name}'")]
    NoSuchMethod { ty: EntityTypeId, name: String },

    #[error("Arguments do not match any '{name}' method of entity type {ty}")]
    ArgumentMismatch { ty: EntityTypeId, name: String },

    #[error(transparent)]
    Entity(#[from] jalse_entity::Error),

    #[error(transparent)]
    Engine(#[from] jalse_engine::Error),
}

impl Error {
    /// True if the error comes from an entity type declaration
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
