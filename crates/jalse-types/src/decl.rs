//! Entity type declarations
//!
//! An entity type is a named set of method signatures, optionally extending
//! other entity types. Each method carries the annotation that binds it to a
//! canonical entity operation, or a default implementation.
//!
//! ```
//! use jalse_entity::AttributeType;
//! use jalse_types::{Annotation, EntityTypeDecl, MethodSig, TypeRef};
//!
//! let house = EntityTypeDecl::new("House")
//!     .extends("Building")
//!     .method(
//!         MethodSig::new("isHaunted")
//!             .returns(TypeRef::optional(TypeRef::Value(AttributeType::Bool)))
//!             .annotate(Annotation::GetAttribute(None)),
//!     );
//! assert_eq!(house.parents().len(), 1);
//! ```

use crate::error::Result;
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_engine::{Action, TimeUnit};
use jalse_entity::{AttributeType, EntityId, EntityTypeId};
use std::fmt;
use std::sync::Arc;

/// Shape of a parameter or return value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// No value
    Void,
    /// A plain boolean result, never an attribute value
    Flag,
    /// An attribute value of the given type
    Value(AttributeType),
    /// An entity id
    Id,
    /// An attribute container to copy from
    Container,
    /// A scheduled task id
    Task,
    /// An entity viewed as the given type
    Entity(EntityTypeId),
    /// A value that may be absent
    Optional(Box<TypeRef>),
    /// A set of values
    Set(Box<TypeRef>),
}

impl TypeRef {
    /// `Optional<inner>`
    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Optional(Box::new(inner))
    }

    /// `Set<inner>`
    pub fn set(inner: TypeRef) -> Self {
        TypeRef::Set(Box::new(inner))
    }

    /// An entity of type `ty`
    pub fn entity(ty: impl Into<EntityTypeId>) -> Self {
        TypeRef::Entity(ty.into())
    }

    /// The wrapped type of an `Optional`, with its flag
    pub fn unwrap_optional(&self) -> (&TypeRef, bool) {
        match self {
            TypeRef::Optional(inner) => (inner, true),
            other => (other, false),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => write!(f, "void"),
            TypeRef::Flag => write!(f, "flag"),
            TypeRef::Value(ty) => write!(f, "{}", ty),
            TypeRef::Id => write!(f, "id"),
            TypeRef::Container => write!(f, "container"),
            TypeRef::Task => write!(f, "task"),
            TypeRef::Entity(ty) => write!(f, "{}", ty),
            TypeRef::Optional(inner) => write!(f, "Option<{}>", inner),
            TypeRef::Set(inner) => write!(f, "Set<{}>", inner),
        }
    }
}

/// Where an entity id comes from when it is fixed by annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSource {
    /// A literal id
    Fixed(EntityId),
    /// A name-based id, see [`EntityId::named`]
    Named(String),
    /// A fresh id per call (only meaningful when creating entities)
    Random,
}

impl IdSource {
    /// The id this source stands for, `None` for random ids
    pub fn fixed_id(&self) -> Option<EntityId> {
        match self {
            IdSource::Fixed(id) => Some(*id),
            IdSource::Named(name) => Some(EntityId::named(name)),
            IdSource::Random => None,
        }
    }
}

/// Builds the action a [`Annotation::ScheduleForActor`] method schedules
pub type ActionFactory = Arc<dyn Fn() -> Arc<dyn Action<EntityProxy>> + Send + Sync>;

/// Pre-implemented method body, invoked with the proxy itself
pub type DefaultImpl = Arc<dyn Fn(&EntityProxy, &[Arg]) -> Result<Return> + Send + Sync>;

/// What a schedule-for-actor method schedules, and when
#[derive(Clone)]
pub struct ScheduleSpec {
    pub action: ActionFactory,
    pub initial_delay: i64,
    pub period: i64,
    pub unit: TimeUnit,
}

impl ScheduleSpec {
    /// Build a new action on every call
    pub fn new<F>(action: F, initial_delay: i64, period: i64, unit: TimeUnit) -> Self
    where
        F: Fn() -> Arc<dyn Action<EntityProxy>> + Send + Sync + 'static,
    {
        Self {
            action: Arc::new(action),
            initial_delay,
            period,
            unit,
        }
    }

    /// Schedule the same action on every call
    pub fn shared(
        action: Arc<dyn Action<EntityProxy>>,
        initial_delay: i64,
        period: i64,
        unit: TimeUnit,
    ) -> Self {
        Self::new(move || action.clone(), initial_delay, period, unit)
    }
}

impl fmt::Debug for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleSpec")
            .field("initial_delay", &self.initial_delay)
            .field("period", &self.period)
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}

/// Binds a method to a canonical entity operation
#[derive(Debug, Clone)]
pub enum Annotation {
    /// Read an attribute; the name is derived from a `get`/`is` prefix if absent
    GetAttribute(Option<String>),
    /// Write an attribute; the name is derived from a `set` prefix if absent
    SetAttribute(Option<String>),
    /// Look up a child entity by id
    GetEntity { of_type: bool },
    /// List child entities
    GetEntities { of_type: bool },
    /// Create a child entity
    NewEntity,
    /// Kill a child entity by id
    KillEntity,
    /// Kill every child entity
    KillEntities,
    /// Mark the entity as a type (and its ancestors)
    MarkAsType(EntityTypeId),
    /// Remove a type mark (and marks of its descendants)
    UnmarkAsType(EntityTypeId),
    /// Schedule an action with the proxy as actor
    ScheduleForActor(ScheduleSpec),
}

impl Annotation {
    /// Name of the resolver this annotation selects
    pub fn resolver_name(&self) -> &'static str {
        match self {
            Annotation::GetAttribute(_) => "GetAttribute",
            Annotation::SetAttribute(_) => "SetAttribute",
            Annotation::GetEntity { .. } => "GetEntity",
            Annotation::GetEntities { .. } => "GetEntities",
            Annotation::NewEntity => "NewEntity",
            Annotation::KillEntity => "KillEntity",
            Annotation::KillEntities => "KillEntities",
            Annotation::MarkAsType(_) => "MarkAsType",
            Annotation::UnmarkAsType(_) => "UnmarkAsType",
            Annotation::ScheduleForActor(_) => "ScheduleForActor",
        }
    }
}

/// Name and parameter shapes identifying a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub name: String,
    pub params: Vec<TypeRef>,
}

impl MethodKey {
    pub fn new(name: impl Into<String>, params: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "{}({})", self.name, params.join(", "))
    }
}

/// A declared method
#[derive(Clone)]
pub struct MethodSig {
    name: String,
    params: Vec<TypeRef>,
    returns: TypeRef,
    annotations: Vec<Annotation>,
    id: Option<IdSource>,
    default: Option<DefaultImpl>,
}

impl MethodSig {
    /// A method taking nothing and returning nothing
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: TypeRef::Void,
            annotations: Vec::new(),
            id: None,
            default: None,
        }
    }

    /// Append a parameter
    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    /// Set the return type
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.returns = ty;
        self
    }

    /// Add an annotation
    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Fix the entity id the method operates on
    pub fn with_id(mut self, id: IdSource) -> Self {
        self.id = Some(id);
        self
    }

    /// Give the method a default implementation
    pub fn default_impl<F>(mut self, body: F) -> Self
    where
        F: Fn(&EntityProxy, &[Arg]) -> Result<Return> + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(body));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeRef] {
        &self.params
    }

    pub fn return_type(&self) -> &TypeRef {
        &self.returns
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn id_source(&self) -> Option<&IdSource> {
        self.id.as_ref()
    }

    pub fn default_body(&self) -> Option<&DefaultImpl> {
        self.default.as_ref()
    }

    pub fn is_default(&self) -> bool {
        self.default.is_some()
    }

    /// Key identifying this method within a type
    pub fn key(&self) -> MethodKey {
        MethodKey::new(self.name.clone(), self.params.clone())
    }
}

impl fmt::Debug for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSig")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("annotations", &self.annotations)
            .field("id", &self.id)
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// Declaration of an entity type
#[derive(Debug, Clone)]
pub struct EntityTypeDecl {
    id: EntityTypeId,
    parents: Vec<EntityTypeId>,
    methods: Vec<MethodSig>,
}

impl EntityTypeDecl {
    pub fn new(id: impl Into<EntityTypeId>) -> Self {
        Self {
            id: id.into(),
            parents: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Inherit every method of `parent`
    pub fn extends(mut self, parent: impl Into<EntityTypeId>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Declare a method
    pub fn method(mut self, method: MethodSig) -> Self {
        self.methods.push(method);
        self
    }

    pub fn id(&self) -> &EntityTypeId {
        &self.id
    }

    pub fn parents(&self) -> &[EntityTypeId] {
        &self.parents
    }

    /// Methods declared directly on this type
    pub fn methods(&self) -> &[MethodSig] {
        &self.methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_key_display() {
        let sig = MethodSig::new("newGhost")
            .param(TypeRef::Id)
            .param(TypeRef::Container)
            .returns(TypeRef::entity("Ghost"));
        assert_eq!(sig.key().to_string(), "newGhost(id, container)");
        assert_eq!(
            TypeRef::optional(TypeRef::Value(AttributeType::Bool)).to_string(),
            "Option<bool>"
        );
        assert_eq!(TypeRef::set(TypeRef::entity("Ghost")).to_string(), "Set<Ghost>");
    }

    #[test]
    fn test_named_ids_are_stable() {
        let a = IdSource::Named("attic".into()).fixed_id();
        let b = IdSource::Named("attic".into()).fixed_id();
        assert_eq!(a, b);
        assert!(a.is_some());
        assert_eq!(IdSource::Random.fixed_id(), None);
    }

    #[test]
    fn test_unwrap_optional() {
        let ty = TypeRef::optional(TypeRef::Task);
        assert_eq!(ty.unwrap_optional(), (&TypeRef::Task, true));
        assert_eq!(TypeRef::Task.unwrap_optional(), (&TypeRef::Task, false));
    }
}
