//! Method resolvers
//!
//! Each resolver inspects one method declaration and, if the method carries
//! its annotation, validates the signature and produces the descriptor that
//! dispatches calls to a canonical entity operation.
//!
//! | Resolver           | Claims methods annotated with | Operation                |
//! |--------------------|-------------------------------|--------------------------|
//! | `GetAttribute`     | `GetAttribute`                | `get_attribute`          |
//! | `SetAttribute`     | `SetAttribute`                | `set/remove_attribute`   |
//! | `GetEntity`        | `GetEntity`                   | `get_entity`             |
//! | `GetEntities`      | `GetEntities`                 | `entities`               |
//! | `NewEntity`        | `NewEntity`                   | `new_entity_with`        |
//! | `KillEntity`       | `KillEntity`                  | `kill_entity`            |
//! | `KillEntities`     | `KillEntities`                | `kill_entities`          |
//! | `MarkAsType`       | `MarkAsType`                  | `mark_as_type`           |
//! | `UnmarkAsType`     | `UnmarkAsType`                | `unmark_as_type`         |
//! | `ScheduleForActor` | `ScheduleForActor`            | `schedule_with_actor`    |
//! | `DefaultMethod`    | (default implementation)      | the supplied closure     |

mod default_method;
mod get_attribute;
mod get_entities;
mod get_entity;
mod kill_entities;
mod kill_entity;
mod mark_as_type;
mod new_entity;
mod schedule_for_actor;
mod set_attribute;
mod unmark_as_type;

pub use default_method::{DefaultMethod, DefaultMethodFunction};
pub use get_attribute::{GetAttributeFunction, GetAttributeMethod};
pub use get_entities::{GetEntitiesFunction, GetEntitiesMethod};
pub use get_entity::{GetEntityFunction, GetEntityMethod};
pub use kill_entities::{KillEntitiesFunction, KillEntitiesMethod};
pub use kill_entity::{KillEntityFunction, KillEntityMethod};
pub use mark_as_type::{MarkAsTypeFunction, MarkAsTypeMethod};
pub use new_entity::{NewEntityFunction, NewEntityMethod};
pub use schedule_for_actor::{ScheduleForActorFunction, ScheduleForActorMethod};
pub use set_attribute::{SetAttributeFunction, SetAttributeMethod};
pub use unmark_as_type::{UnmarkAsTypeFunction, UnmarkAsTypeMethod};

use crate::decl::{Annotation, MethodSig, TypeRef};
use crate::error::{Error, MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_entity::{EntityId, EntityTypeId};
use std::sync::Arc;

/// Resolved dispatch for one method
pub trait EntityMethod: Send + Sync {
    /// Run the canonical operation against the proxy's entity
    fn invoke(&self, proxy: &EntityProxy, args: &[Arg]) -> Result<Return>;

    /// Entity types this method hands out or marks
    fn dependencies(&self) -> Vec<EntityTypeId> {
        Vec::new()
    }
}

/// Turns method declarations into [`EntityMethod`]s
pub trait EntityMethodFunction: Send + Sync {
    /// Short name used in error listings
    fn name(&self) -> &'static str;

    /// `Ok(None)` if the method is not for this resolver
    fn apply(&self, method: &MethodSig)
        -> std::result::Result<Option<Arc<dyn EntityMethod>>, MethodError>;
}

static RESOLVERS: [&dyn EntityMethodFunction; 11] = [
    &GetAttributeFunction,
    &SetAttributeFunction,
    &GetEntityFunction,
    &GetEntitiesFunction,
    &NewEntityFunction,
    &KillEntityFunction,
    &KillEntitiesFunction,
    &MarkAsTypeFunction,
    &UnmarkAsTypeFunction,
    &ScheduleForActorFunction,
    &DefaultMethodFunction,
];

/// Every resolver, in the order they are tried
pub fn resolvers() -> &'static [&'static dyn EntityMethodFunction] {
    &RESOLVERS
}

/// Wrap a concrete resolution result for [`EntityMethodFunction::apply`]
fn erase<M: EntityMethod + 'static>(
    resolved: std::result::Result<Option<M>, MethodError>,
) -> std::result::Result<Option<Arc<dyn EntityMethod>>, MethodError> {
    resolved.map(|m| m.map(|m| Arc::new(m) as Arc<dyn EntityMethod>))
}

fn reject_default(method: &MethodSig) -> std::result::Result<(), MethodError> {
    if method.is_default() {
        Err(MethodError::DefaultNotAllowed)
    } else {
        Ok(())
    }
}

fn expect_no_params(method: &MethodSig) -> std::result::Result<(), MethodError> {
    match method.params().len() {
        0 => Ok(()),
        got => Err(MethodError::ParamCount {
            expected: "no",
            got,
        }),
    }
}

/// Accept `void` or a plain flag, returning whether a flag is wanted
fn flag_or_void(method: &MethodSig) -> std::result::Result<bool, MethodError> {
    match method.return_type() {
        TypeRef::Void => Ok(false),
        TypeRef::Flag => Ok(true),
        other => Err(MethodError::ReturnType {
            expected: "flag or void",
            got: other.clone(),
        }),
    }
}

fn find_annotation<'a, T>(
    method: &'a MethodSig,
    select: impl Fn(&'a Annotation) -> Option<T>,
) -> Option<T> {
    method.annotations().iter().find_map(select)
}

/// Derive an attribute name by stripping one of `prefixes`
///
/// `getGhostCount` becomes `ghostCount`. The remainder must start with an
/// upper-case letter, so `island` is not `is` + `land`.
pub fn derive_name(method: &str, prefixes: &[&str]) -> Option<String> {
    prefixes.iter().find_map(|prefix| {
        let rest = method.strip_prefix(prefix)?;
        let mut chars = rest.chars();
        let first = chars.next()?;
        if !first.is_uppercase() {
            return None;
        }
        Some(first.to_lowercase().chain(chars).collect())
    })
}

/// Where a looked-up entity id comes from at call time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSupplier {
    /// The argument at this position
    Param(usize),
    /// A fixed id
    Fixed(EntityId),
}

impl IdSupplier {
    /// Resolve the id a method must look up
    ///
    /// Exactly one of an id parameter (the only parameter) or an id
    /// annotation must be present.
    fn for_lookup(method: &MethodSig) -> std::result::Result<Self, MethodError> {
        let param = match method.params() {
            [] => None,
            [TypeRef::Id] => Some(0),
            [other] => {
                return Err(MethodError::ParamType {
                    index: 0,
                    expected: "an entity id",
                    got: other.clone(),
                })
            }
            params => {
                return Err(MethodError::ParamCount {
                    expected: "at most one",
                    got: params.len(),
                })
            }
        };
        match (param, method.id_source()) {
            (Some(_), Some(_)) => Err(MethodError::ConflictingIdSources),
            (Some(index), None) => Ok(IdSupplier::Param(index)),
            (None, Some(source)) => source
                .fixed_id()
                .map(IdSupplier::Fixed)
                .ok_or(MethodError::RandomIdLookup),
            (None, None) => Err(MethodError::MissingIdSource),
        }
    }

    fn get(&self, proxy: &EntityProxy, args: &[Arg]) -> Result<EntityId> {
        match self {
            IdSupplier::Fixed(id) => Ok(*id),
            IdSupplier::Param(index) => args
                .get(*index)
                .and_then(Arg::as_id)
                .ok_or_else(|| Error::ArgumentMismatch {
                    ty: proxy.entity_type().clone(),
                    name: format!("<id argument {}>", index),
                }),
        }
    }
}

/// Entity type returned by a method: `Entity` or `Optional<Entity>`
fn entity_return(ty: &TypeRef) -> Option<(EntityTypeId, bool)> {
    match ty.unwrap_optional() {
        (TypeRef::Entity(id), optional) => Some((id.clone(), optional)),
        _ => None,
    }
}
