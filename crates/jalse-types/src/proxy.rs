//! Typed views of entities
//!
//! An [`EntityProxy`] pairs an entity with the dispatch table of one entity
//! type. Calls are routed by method name and argument shapes to the
//! resolved [`EntityMethod`](crate::EntityMethod).

use crate::decl::TypeRef;
use crate::error::{Error, Result};
use crate::resolver::{DispatchTable, EntityTypes};
use jalse_engine::TaskId;
use jalse_entity::{AttributeContainer, Entity, EntityId, EntityTypeId, Value};
use log::trace;
use std::fmt;
use std::sync::Arc;

/// Argument passed to a proxy method
#[derive(Clone)]
pub enum Arg {
    /// An attribute value; `None` means "no value" (a setter then removes)
    Value(Option<Value>),
    /// An entity id
    Id(EntityId),
    /// Attributes to copy into a new entity
    Container(Arc<dyn AttributeContainer>),
}

impl Arg {
    /// Check whether this argument fits a parameter of type `ty`
    pub fn matches(&self, ty: &TypeRef) -> bool {
        match (self, ty) {
            (Arg::Value(Some(value)), TypeRef::Value(expected)) => expected.matches(value),
            (Arg::Value(Some(Value::Bool(_))), TypeRef::Flag) => true,
            (Arg::Value(None), TypeRef::Value(_) | TypeRef::Optional(_)) => true,
            (Arg::Value(Some(_)), TypeRef::Optional(inner)) => self.matches(inner),
            (Arg::Id(_), TypeRef::Id) => true,
            (Arg::Container(_), TypeRef::Container) => true,
            _ => false,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(value) => value.as_ref(),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<EntityId> {
        match self {
            Arg::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&dyn AttributeContainer> {
        match self {
            Arg::Container(container) => Some(container.as_ref()),
            _ => None,
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(Some(value))
    }
}

impl From<Option<Value>> for Arg {
    fn from(value: Option<Value>) -> Self {
        Arg::Value(value)
    }
}

impl From<EntityId> for Arg {
    fn from(id: EntityId) -> Self {
        Arg::Id(id)
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Arg::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Arg::Container(_) => f.write_str("Container(..)"),
        }
    }
}

/// Result of a proxy method
#[derive(Debug, Clone)]
pub enum Return {
    Void,
    Flag(bool),
    Value(Option<Value>),
    Entity(Option<EntityProxy>),
    Entities(Vec<EntityProxy>),
    Task(Option<TaskId>),
}

impl Return {
    pub fn is_void(&self) -> bool {
        matches!(self, Return::Void)
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Return::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Return::Value(value) => value,
            _ => None,
        }
    }

    pub fn into_entity(self) -> Option<EntityProxy> {
        match self {
            Return::Entity(entity) => entity,
            _ => None,
        }
    }

    pub fn into_entities(self) -> Vec<EntityProxy> {
        match self {
            Return::Entities(entities) => entities,
            Return::Entity(entity) => entity.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_task(self) -> Option<TaskId> {
        match self {
            Return::Task(id) => id,
            _ => None,
        }
    }
}

/// An entity viewed as an entity type
#[derive(Clone)]
pub struct EntityProxy {
    entity: Entity,
    table: Arc<DispatchTable>,
    types: EntityTypes,
}

impl EntityProxy {
    pub(crate) fn new(entity: Entity, table: Arc<DispatchTable>, types: EntityTypes) -> Self {
        Self {
            entity,
            table,
            types,
        }
    }

    /// The underlying entity
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn id(&self) -> EntityId {
        self.entity.id()
    }

    /// The type this proxy presents
    pub fn entity_type(&self) -> &EntityTypeId {
        self.table.entity_type()
    }

    /// The resolved methods of this proxy's type
    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// The registry this proxy was built from
    pub fn types(&self) -> &EntityTypes {
        &self.types
    }

    /// View the same entity as another type
    pub fn as_type(&self, ty: &EntityTypeId) -> Result<EntityProxy> {
        self.types.as_type(&self.entity, ty)
    }

    /// Call the method `name` whose parameters fit `args`
    ///
    /// Methods are tried in declaration order; the first whose parameter
    /// shapes fit is called.
    pub fn invoke(&self, name: &str, args: &[Arg]) -> Result<Return> {
        let mut named = false;
        for (key, method) in self.table.methods() {
            if key.name != name {
                continue;
            }
            named = true;
            if key.params.len() == args.len()
                && args.iter().zip(&key.params).all(|(arg, ty)| arg.matches(ty))
            {
                trace!("{} invoking {} on {}", self.entity_type(), key, self.id());
                return method.invoke(self, args);
            }
        }
        let ty = self.entity_type().clone();
        let name = name.to_string();
        if named {
            Err(Error::ArgumentMismatch { ty, name })
        } else {
            Err(Error::NoSuchMethod { ty, name })
        }
    }
}

impl PartialEq for EntityProxy {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity && self.entity_type() == other.entity_type()
    }
}

impl fmt::Debug for EntityProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProxy")
            .field("entity", &self.entity.id())
            .field("type", self.entity_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{Annotation, EntityTypeDecl, MethodSig, ScheduleSpec};
    use jalse_engine::{Action, ActionContext, ActionResult, Engine, ManualEngine, TimeUnit};
    use jalse_entity::{AttributeType, EntityContainer, World};

    fn bool_value() -> TypeRef {
        TypeRef::Value(AttributeType::Bool)
    }

    fn scare() -> Arc<dyn Action<EntityProxy>> {
        Arc::new(|ctx: &ActionContext<'_, EntityProxy>| -> ActionResult {
            let house = ctx.actor().entity();
            let scares = house
                .get_attribute("scares", AttributeType::Int)
                .and_then(|v| v.as_int())
                .unwrap_or(0);
            house.set_attribute("scares", AttributeType::Int, (scares + 1).into())?;
            Ok(())
        })
    }

    fn haunted_types() -> EntityTypes {
        let types = EntityTypes::new();
        types
            .register(
                EntityTypeDecl::new("Ghost").method(
                    MethodSig::new("getName")
                        .returns(TypeRef::Value(AttributeType::String))
                        .annotate(Annotation::GetAttribute(None)),
                ),
            )
            .unwrap();
        types.register(EntityTypeDecl::new("Cursed")).unwrap();
        let ghost = || TypeRef::entity("Ghost");
        types
            .register(
                EntityTypeDecl::new("House")
                    .method(
                        MethodSig::new("isHaunted")
                            .returns(TypeRef::optional(bool_value()))
                            .annotate(Annotation::GetAttribute(None)),
                    )
                    .method(
                        MethodSig::new("setHaunted")
                            .param(bool_value())
                            .returns(TypeRef::optional(bool_value()))
                            .annotate(Annotation::SetAttribute(None)),
                    )
                    .method(
                        MethodSig::new("newGhost")
                            .param(TypeRef::Id)
                            .returns(ghost())
                            .annotate(Annotation::NewEntity),
                    )
                    .method(
                        MethodSig::new("newGhost")
                            .param(TypeRef::Id)
                            .param(TypeRef::Container)
                            .returns(ghost())
                            .annotate(Annotation::NewEntity),
                    )
                    .method(
                        MethodSig::new("getGhost")
                            .param(TypeRef::Id)
                            .returns(TypeRef::optional(ghost()))
                            .annotate(Annotation::GetEntity { of_type: true }),
                    )
                    .method(
                        MethodSig::new("getGhosts")
                            .returns(TypeRef::set(ghost()))
                            .annotate(Annotation::GetEntities { of_type: true }),
                    )
                    .method(
                        MethodSig::new("exorcise")
                            .param(TypeRef::Id)
                            .returns(TypeRef::Flag)
                            .annotate(Annotation::KillEntity),
                    )
                    .method(MethodSig::new("exorciseAll").annotate(Annotation::KillEntities))
                    .method(
                        MethodSig::new("curse")
                            .returns(TypeRef::Flag)
                            .annotate(Annotation::MarkAsType("Cursed".into())),
                    )
                    .method(
                        MethodSig::new("lift").annotate(Annotation::UnmarkAsType("Cursed".into())),
                    )
                    .method(
                        MethodSig::new("startHaunting")
                            .returns(TypeRef::optional(TypeRef::Task))
                            .annotate(Annotation::ScheduleForActor(ScheduleSpec::shared(
                                scare(),
                                0,
                                100,
                                TimeUnit::Milliseconds,
                            ))),
                    )
                    .method(MethodSig::new("isSpooky").returns(TypeRef::Flag).default_impl(
                        |house, _| {
                            let haunted = house.invoke("isHaunted", &[])?.into_value();
                            let ghosts = house.invoke("getGhosts", &[])?.into_entities();
                            Ok(Return::Flag(
                                haunted == Some(Value::Bool(true)) && !ghosts.is_empty(),
                            ))
                        },
                    )),
            )
            .unwrap();
        types
    }

    fn house() -> (Arc<ManualEngine>, World, EntityProxy) {
        let engine = Arc::new(ManualEngine::new(10).unwrap());
        let world = World::new(engine.clone());
        let entity = world.new_entity().unwrap();
        let house = haunted_types().as_type(&entity, &"House".into()).unwrap();
        (engine, world, house)
    }

    #[test]
    fn test_arg_shapes() {
        let int = TypeRef::Value(AttributeType::Int);
        assert!(Arg::from(Value::Int(3)).matches(&int));
        assert!(!Arg::from(Value::from("three")).matches(&int));
        assert!(Arg::Value(None).matches(&int));
        assert!(Arg::from(Value::Bool(true)).matches(&TypeRef::Flag));
        assert!(Arg::from(EntityId::random()).matches(&TypeRef::Id));
        assert!(!Arg::from(EntityId::random()).matches(&int));
        assert!(Arg::from(Value::Int(3)).matches(&TypeRef::optional(int)));
    }

    #[test]
    fn test_is_haunted() {
        let (_engine, _world, house) = house();
        assert_eq!(house.invoke("isHaunted", &[]).unwrap().into_value(), None);

        let previous = house
            .invoke("setHaunted", &[Value::Bool(true).into()])
            .unwrap();
        assert_eq!(previous.into_value(), None);
        assert_eq!(
            house.invoke("isHaunted", &[]).unwrap().into_value(),
            Some(Value::Bool(true))
        );
        assert_eq!(
            house
                .entity()
                .get_attribute("haunted", AttributeType::Bool),
            Some(Value::Bool(true))
        );

        // No value removes the attribute.
        let previous = house.invoke("setHaunted", &[Arg::Value(None)]).unwrap();
        assert_eq!(previous.into_value(), Some(Value::Bool(true)));
        assert_eq!(house.invoke("isHaunted", &[]).unwrap().into_value(), None);
    }

    #[test]
    fn test_child_entities() {
        let (_engine, _world, house) = house();
        let casper = EntityId::named("casper");
        let ghost = house
            .invoke("newGhost", &[casper.into()])
            .unwrap()
            .into_entity()
            .unwrap();
        assert_eq!(ghost.id(), casper);
        assert_eq!(ghost.entity_type().as_str(), "Ghost");
        assert!(ghost.entity().is_marked_as(&"Ghost".into()));

        let source = house.entity().new_entity().unwrap();
        source
            .set_attribute("name", AttributeType::String, "Slimer".into())
            .unwrap();
        let slimer = house
            .invoke(
                "newGhost",
                &[EntityId::random().into(), Arg::Container(Arc::new(source.clone()))],
            )
            .unwrap()
            .into_entity()
            .unwrap();
        assert_eq!(
            slimer.invoke("getName", &[]).unwrap().into_value(),
            Some(Value::from("Slimer"))
        );

        // Unmarked children are not ghosts.
        assert!(house
            .invoke("getGhost", &[source.id().into()])
            .unwrap()
            .into_entity()
            .is_none());
        assert_eq!(
            house.invoke("getGhost", &[casper.into()]).unwrap().into_entity(),
            Some(ghost)
        );
        assert_eq!(house.invoke("getGhosts", &[]).unwrap().into_entities().len(), 2);

        assert_eq!(
            house.invoke("exorcise", &[casper.into()]).unwrap().as_flag(),
            Some(true)
        );
        assert_eq!(
            house.invoke("exorcise", &[casper.into()]).unwrap().as_flag(),
            Some(false)
        );
        assert!(house.invoke("exorciseAll", &[]).unwrap().is_void());
        assert_eq!(house.entity().entity_count(), 0);
    }

    #[test]
    fn test_marks() {
        let (_engine, _world, house) = house();
        assert_eq!(house.invoke("curse", &[]).unwrap().as_flag(), Some(true));
        assert_eq!(house.invoke("curse", &[]).unwrap().as_flag(), Some(false));
        assert!(house.entity().is_marked_as(&"Cursed".into()));
        house.invoke("lift", &[]).unwrap();
        assert!(!house.entity().is_marked_as(&"Cursed".into()));
    }

    #[test]
    fn test_schedule_for_actor() {
        let (engine, _world, house) = house();
        let task = house
            .invoke("startHaunting", &[])
            .unwrap()
            .into_task()
            .unwrap();
        engine.step_n(3).unwrap();
        assert_eq!(
            house.entity().get_attribute("scares", AttributeType::Int),
            Some(Value::Int(3))
        );
        assert!(engine.is_active(task));
        assert!(house.entity().scheduled_tasks().contains(&task));

        assert!(house.entity().kill());
        assert!(!engine.is_active(task));
        assert!(matches!(
            house.invoke("startHaunting", &[]),
            Err(Error::Engine(jalse_engine::Error::Detached))
        ));
    }

    #[test]
    fn test_default_method() {
        let (_engine, _world, house) = house();
        assert_eq!(house.invoke("isSpooky", &[]).unwrap().as_flag(), Some(false));
        house
            .invoke("setHaunted", &[Value::Bool(true).into()])
            .unwrap();
        house
            .invoke("newGhost", &[EntityId::random().into()])
            .unwrap();
        assert_eq!(house.invoke("isSpooky", &[]).unwrap().as_flag(), Some(true));
    }

    #[test]
    fn test_dispatch_errors() {
        let (_engine, _world, house) = house();
        assert!(matches!(
            house.invoke("summon", &[]),
            Err(Error::NoSuchMethod { .. })
        ));
        assert!(matches!(
            house.invoke("setHaunted", &[Value::Int(1).into()]),
            Err(Error::ArgumentMismatch { .. })
        ));
        let err = house.invoke("newGhost", &[]).unwrap_err();
        assert!(!err.is_config());
    }

    #[test]
    fn test_return_accessors() {
        assert_eq!(
            Return::Value(Some(Value::Int(1))).into_value(),
            Some(Value::Int(1))
        );
        assert_eq!(Return::Void.into_value(), None);
        assert_eq!(Return::Flag(true).as_flag(), Some(true));
        assert!(Return::Void.is_void());
        assert!(Return::Entity(None).into_entities().is_empty());
    }
}
