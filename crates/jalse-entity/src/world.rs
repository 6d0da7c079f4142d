//! The root container of a simulation

use crate::attribute::{AttributeContainer, AttributeKey, AttributeListener};
use crate::entity::{Entity, EntityContainer, EntityListener};
use crate::error::Result;
use crate::identity::EntityId;
use crate::value::{AttributeType, Value};
use jalse_engine::Engine;
use log::debug;
use std::sync::Arc;

/// Root of an entity tree, bound to an engine
///
/// Every entity created below a world schedules its actions on the world's
/// engine. A world may cap the number of entities it holds directly.
///
/// ```
/// use jalse_engine::ManualEngine;
/// use jalse_entity::{AttributeContainer, AttributeType, EntityContainer, World};
/// use std::sync::Arc;
///
/// let world = World::new(Arc::new(ManualEngine::new(30)?));
/// let house = world.new_entity()?;
/// house.set_attribute("haunted", AttributeType::Bool, true.into())?;
/// assert_eq!(world.entity_count(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct World {
    root: Entity,
}

impl World {
    /// Create a world bound to `engine`
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self::build(Some(engine), None)
    }

    /// Create a world holding at most `limit` direct entities
    pub fn with_entity_limit(engine: Arc<dyn Engine>, limit: usize) -> Self {
        Self::build(Some(engine), Some(limit))
    }

    /// Create a world with no engine; scheduling fails until one is bound
    pub fn unbound() -> Self {
        Self::build(None, None)
    }

    fn build(engine: Option<Arc<dyn Engine>>, limit: Option<usize>) -> Self {
        let id = EntityId::random();
        debug!("created world {}", id);
        Self {
            root: Entity::root_entity(id, engine, limit),
        }
    }

    /// World id
    pub fn id(&self) -> EntityId {
        self.root.id()
    }

    /// The root entity; schedule world-level actions through it
    pub fn root(&self) -> &Entity {
        &self.root
    }

    /// The bound engine
    pub fn engine(&self) -> Option<Arc<dyn Engine>> {
        self.root.engine()
    }

    /// Bind a new engine, returning the previous one
    ///
    /// Tasks already scheduled stay on the engine they were scheduled on.
    pub fn bind_engine(&self, engine: Arc<dyn Engine>) -> Option<Arc<dyn Engine>> {
        self.root.bind_engine(Some(engine))
    }

    /// Unbind the engine, returning it
    pub fn unbind_engine(&self) -> Option<Arc<dyn Engine>> {
        self.root.bind_engine(None)
    }

    /// Maximum number of direct entities, if capped
    pub fn entity_limit(&self) -> Option<usize> {
        self.root.entity_limit()
    }

    /// Search the whole tree for `id`
    pub fn find_entity(&self, id: EntityId) -> Option<Entity> {
        self.root.find_entity(id)
    }

    /// Kill every entity and cancel all world-owned tasks
    ///
    /// The world cannot create entities afterwards.
    pub fn shutdown(&self) {
        self.root.kill_root();
        debug!("world {} shut down", self.id());
    }
}

impl EntityContainer for World {
    fn get_entity(&self, id: EntityId) -> Option<Entity> {
        self.root.get_entity(id)
    }

    fn new_entity_with(
        &self,
        id: Option<EntityId>,
        source: Option<&dyn AttributeContainer>,
    ) -> Result<Entity> {
        self.root.new_entity_with(id, source)
    }

    fn kill_entity(&self, id: EntityId) -> bool {
        self.root.kill_entity(id)
    }

    fn kill_entities(&self) {
        self.root.kill_entities()
    }

    fn entities(&self) -> Vec<Entity> {
        self.root.entities()
    }

    fn entity_count(&self) -> usize {
        self.root.entity_count()
    }

    fn add_entity_listener(&self, listener: Arc<dyn EntityListener>) -> bool {
        self.root.add_entity_listener(listener)
    }

    fn remove_entity_listener(&self, listener: &Arc<dyn EntityListener>) -> bool {
        self.root.remove_entity_listener(listener)
    }
}

impl AttributeContainer for World {
    fn get_attribute(&self, name: &str, ty: AttributeType) -> Option<Value> {
        self.root.get_attribute(name, ty)
    }

    fn set_attribute(&self, name: &str, ty: AttributeType, value: Value) -> Result<Option<Value>> {
        self.root.set_attribute(name, ty, value)
    }

    fn remove_attribute(&self, name: &str, ty: AttributeType) -> Option<Value> {
        self.root.remove_attribute(name, ty)
    }

    fn attributes(&self) -> Vec<(AttributeKey, Value)> {
        self.root.attributes()
    }

    fn attribute_count(&self) -> usize {
        self.root.attribute_count()
    }

    fn add_attribute_listener(
        &self,
        name: &str,
        ty: AttributeType,
        listener: Arc<dyn AttributeListener>,
    ) -> bool {
        self.root.add_attribute_listener(name, ty, listener)
    }

    fn remove_attribute_listener(
        &self,
        name: &str,
        ty: AttributeType,
        listener: &Arc<dyn AttributeListener>,
    ) -> bool {
        self.root.remove_attribute_listener(name, ty, listener)
    }

    fn fire_attribute_changed(&self, name: &str, ty: AttributeType) {
        self.root.fire_attribute_changed(name, ty)
    }
}
