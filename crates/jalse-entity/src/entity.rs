//! Entities: attribute carriers arranged in a tree
//!
//! An [`Entity`] is a cheap, cloneable handle. Every entity is also a
//! container of child entities, so a simulation is a tree rooted at a
//! [`World`](crate::World). The engine an entity schedules on is the one
//! bound to its root.

use crate::attribute::{AttributeContainer, AttributeKey, AttributeListener, AttributeSet};
use crate::error::{Error, Result};
use crate::identity::{EntityId, EntityTypeId};
use crate::value::{AttributeType, Value};
use indexmap::{IndexMap, IndexSet};
use jalse_engine::{Action, Engine, EngineExt, Scheduler, TaskId, TaskTracker};
use log::debug;
use parking_lot::RwLock;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Observer of entities created in or killed from a container
pub trait EntityListener: Send + Sync {
    /// `entity` was added to the container
    fn entity_created(&self, _entity: &Entity) {}

    /// `entity` was killed and removed from the container
    fn entity_killed(&self, _entity: &Entity) {}
}

/// Canonical operations of a container of entities
pub trait EntityContainer {
    /// Look up a direct child by id
    fn get_entity(&self, id: EntityId) -> Option<Entity>;

    /// Create a child, optionally with a fixed id and attributes copied from
    /// `source`
    fn new_entity_with(
        &self,
        id: Option<EntityId>,
        source: Option<&dyn AttributeContainer>,
    ) -> Result<Entity>;

    /// Create a child with a random id
    fn new_entity(&self) -> Result<Entity> {
        self.new_entity_with(None, None)
    }

    /// Create a child with the given id
    fn new_entity_with_id(&self, id: EntityId) -> Result<Entity> {
        self.new_entity_with(Some(id), None)
    }

    /// Kill and remove a child, returning whether it existed
    fn kill_entity(&self, id: EntityId) -> bool;

    /// Kill and remove every child
    fn kill_entities(&self);

    /// Direct children, in creation order
    fn entities(&self) -> Vec<Entity>;

    /// Ids of the direct children
    fn entity_ids(&self) -> Vec<EntityId> {
        self.entities().iter().map(Entity::id).collect()
    }

    /// Number of direct children
    fn entity_count(&self) -> usize;

    /// Check whether a direct child exists
    fn has_entity(&self, id: EntityId) -> bool {
        self.get_entity(id).is_some()
    }

    /// Direct children marked as `ty`
    fn entities_of_type(&self, ty: &EntityTypeId) -> Vec<Entity> {
        self.entities()
            .into_iter()
            .filter(|e| e.is_marked_as(ty))
            .collect()
    }

    /// Subscribe to creation and death of children
    fn add_entity_listener(&self, listener: Arc<dyn EntityListener>) -> bool;

    /// Unsubscribe a listener
    fn remove_entity_listener(&self, listener: &Arc<dyn EntityListener>) -> bool;
}

struct EntityInner {
    id: EntityId,
    parent: Option<Weak<EntityInner>>,
    alive: AtomicBool,
    attributes: AttributeSet,
    children: RwLock<IndexMap<EntityId, Entity>>,
    marks: RwLock<IndexSet<EntityTypeId>>,
    entity_listeners: RwLock<Vec<Arc<dyn EntityListener>>>,
    tasks: TaskTracker,
    // Root only.
    engine: RwLock<Option<Arc<dyn Engine>>>,
    entity_limit: Option<usize>,
}

/// Shared handle to an entity
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    fn with_parts(id: EntityId, parent: Option<Weak<EntityInner>>, limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                id,
                parent,
                alive: AtomicBool::new(true),
                attributes: AttributeSet::new(id),
                children: RwLock::new(IndexMap::new()),
                marks: RwLock::new(IndexSet::new()),
                entity_listeners: RwLock::new(Vec::new()),
                tasks: TaskTracker::new(),
                engine: RwLock::new(None),
                entity_limit: limit,
            }),
        }
    }

    /// Create a root entity with no parent
    pub(crate) fn root_entity(
        id: EntityId,
        engine: Option<Arc<dyn Engine>>,
        entity_limit: Option<usize>,
    ) -> Self {
        let root = Self::with_parts(id, None, entity_limit);
        *root.inner.engine.write() = engine;
        root
    }

    /// Entity id
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// False once the entity has been killed
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    /// The containing entity, if any and still alive
    pub fn parent(&self) -> Option<Entity> {
        let inner = self.inner.parent.as_ref()?.upgrade()?;
        Some(Entity { inner })
    }

    /// The top of this entity's tree
    pub fn root(&self) -> Entity {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// The engine bound to this entity's root
    pub fn engine(&self) -> Option<Arc<dyn Engine>> {
        self.root().inner.engine.read().clone()
    }

    pub(crate) fn bind_engine(&self, engine: Option<Arc<dyn Engine>>) -> Option<Arc<dyn Engine>> {
        std::mem::replace(&mut *self.inner.engine.write(), engine)
    }

    pub(crate) fn entity_limit(&self) -> Option<usize> {
        self.inner.entity_limit
    }

    /// Depth-first search of the whole subtree
    pub fn find_entity(&self, id: EntityId) -> Option<Entity> {
        if let Some(child) = self.get_entity(id) {
            return Some(child);
        }
        self.entities()
            .into_iter()
            .find_map(|child| child.find_entity(id))
    }

    /// Check whether this entity descends from `ancestor`
    pub fn is_descendant_of(&self, ancestor: &Entity) -> bool {
        let mut current = self.parent();
        while let Some(entity) = current {
            if entity == *ancestor {
                return true;
            }
            current = entity.parent();
        }
        false
    }

    // ------------------------------------------------------------------
    // Marks
    // ------------------------------------------------------------------

    /// Record `ty` on this entity, returning whether it was newly added
    pub fn add_mark(&self, ty: EntityTypeId) -> bool {
        self.inner.marks.write().insert(ty)
    }

    /// Remove `ty`, returning whether it was present
    pub fn remove_mark(&self, ty: &EntityTypeId) -> bool {
        self.inner.marks.write().shift_remove(ty)
    }

    /// Check whether `ty` is recorded
    pub fn is_marked_as(&self, ty: &EntityTypeId) -> bool {
        self.inner.marks.read().contains(ty)
    }

    /// Every recorded type, in marking order
    pub fn marks(&self) -> Vec<EntityTypeId> {
        self.inner.marks.read().iter().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Schedule `action` against an arbitrary actor on this entity's engine
    ///
    /// The task is owned by this entity: killing the entity cancels it.
    pub fn schedule_with_actor<A>(
        &self,
        action: Arc<dyn Action<A>>,
        actor: A,
        initial_delay: Duration,
        period: Duration,
    ) -> jalse_engine::Result<TaskId>
    where
        A: Send + Sync + 'static,
    {
        if !self.is_alive() {
            return Err(jalse_engine::Error::Detached);
        }
        let engine = self.engine().ok_or(jalse_engine::Error::Detached)?;
        let id = engine.schedule_for_actor(action, actor, initial_delay, period)?;
        self.inner.tasks.track_pruned(engine.as_ref(), id);
        Ok(id)
    }

    /// Ids of the tasks this entity owns
    pub fn scheduled_tasks(&self) -> Vec<TaskId> {
        self.inner.tasks.ids()
    }

    // ------------------------------------------------------------------
    // Death
    // ------------------------------------------------------------------

    /// Mark dead, cancel owned tasks and kill the whole subtree
    fn die(&self, engine: Option<&Arc<dyn Engine>>) {
        if !self.inner.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(engine) = engine {
            self.inner.tasks.cancel_all(engine.as_ref());
        }
        let children: Vec<Entity> = self
            .inner
            .children
            .write()
            .drain(..)
            .map(|(_, e)| e)
            .collect();
        for child in &children {
            child.die(engine);
        }
        let listeners = self.inner.entity_listeners.read().clone();
        for child in &children {
            for listener in &listeners {
                listener.entity_killed(child);
            }
        }
    }

    /// Kill this entity via its parent
    ///
    /// Returns `false` if it was already dead or is a root.
    pub fn kill(&self) -> bool {
        match self.parent() {
            Some(parent) => parent.kill_entity(self.id()),
            None => false,
        }
    }

    pub(crate) fn kill_root(&self) {
        let engine = self.engine();
        self.die(engine.as_ref());
    }
}

impl EntityContainer for Entity {
    fn get_entity(&self, id: EntityId) -> Option<Entity> {
        self.inner.children.read().get(&id).cloned()
    }

    fn new_entity_with(
        &self,
        id: Option<EntityId>,
        source: Option<&dyn AttributeContainer>,
    ) -> Result<Entity> {
        if !self.is_alive() {
            return Err(Error::Detached(self.id()));
        }
        let id = id.unwrap_or_else(EntityId::random);
        let entity = Entity::with_parts(id, Some(Arc::downgrade(&self.inner)), None);
        if let Some(source) = source {
            for (key, value) in source.attributes() {
                entity.inner.attributes.set_attribute(key.name(), key.ty(), value)?;
            }
        }

        {
            let mut children = self.inner.children.write();
            // `die` clears the flag before draining under this lock.
            if !self.is_alive() {
                return Err(Error::Detached(self.id()));
            }
            if children.contains_key(&id) {
                return Err(Error::DuplicateId(id));
            }
            if let Some(limit) = self.inner.entity_limit {
                if children.len() >= limit {
                    return Err(Error::LimitReached { limit });
                }
            }
            children.insert(id, entity.clone());
        }

        let listeners = self.inner.entity_listeners.read().clone();
        for listener in &listeners {
            listener.entity_created(&entity);
        }
        Ok(entity)
    }

    fn kill_entity(&self, id: EntityId) -> bool {
        let Some(entity) = self.inner.children.write().shift_remove(&id) else {
            return false;
        };
        entity.die(self.engine().as_ref());
        debug!("killed {} from {}", id, self.id());

        let listeners = self.inner.entity_listeners.read().clone();
        for listener in &listeners {
            listener.entity_killed(&entity);
        }
        true
    }

    fn kill_entities(&self) {
        for id in self.entity_ids() {
            self.kill_entity(id);
        }
    }

    fn entities(&self) -> Vec<Entity> {
        self.inner.children.read().values().cloned().collect()
    }

    fn entity_count(&self) -> usize {
        self.inner.children.read().len()
    }

    fn add_entity_listener(&self, listener: Arc<dyn EntityListener>) -> bool {
        let mut listeners = self.inner.entity_listeners.write();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    fn remove_entity_listener(&self, listener: &Arc<dyn EntityListener>) -> bool {
        let mut listeners = self.inner.entity_listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before != listeners.len()
    }
}

impl AttributeContainer for Entity {
    fn get_attribute(&self, name: &str, ty: AttributeType) -> Option<Value> {
        self.inner.attributes.get_attribute(name, ty)
    }

    fn set_attribute(&self, name: &str, ty: AttributeType, value: Value) -> Result<Option<Value>> {
        self.inner.attributes.set_attribute(name, ty, value)
    }

    fn remove_attribute(&self, name: &str, ty: AttributeType) -> Option<Value> {
        self.inner.attributes.remove_attribute(name, ty)
    }

    fn attributes(&self) -> Vec<(AttributeKey, Value)> {
        self.inner.attributes.attributes()
    }

    fn attribute_count(&self) -> usize {
        self.inner.attributes.attribute_count()
    }

    fn add_attribute_listener(
        &self,
        name: &str,
        ty: AttributeType,
        listener: Arc<dyn AttributeListener>,
    ) -> bool {
        self.inner.attributes.add_attribute_listener(name, ty, listener)
    }

    fn remove_attribute_listener(
        &self,
        name: &str,
        ty: AttributeType,
        listener: &Arc<dyn AttributeListener>,
    ) -> bool {
        self.inner
            .attributes
            .remove_attribute_listener(name, ty, listener)
    }

    fn fire_attribute_changed(&self, name: &str, ty: AttributeType) {
        self.inner.attributes.fire_attribute_changed(name, ty)
    }
}

impl Scheduler<Entity> for Entity {
    fn schedule_action(
        &self,
        action: Arc<dyn Action<Entity>>,
        initial_delay: Duration,
        period: Duration,
    ) -> jalse_engine::Result<TaskId> {
        self.schedule_with_actor(action, self.clone(), initial_delay, period)
    }

    fn cancel(&self, id: TaskId) -> bool {
        if !self.inner.tasks.untrack(id) {
            return false;
        }
        self.engine().is_some_and(|engine| engine.cancel(id))
    }

    fn is_active(&self, id: TaskId) -> bool {
        self.inner.tasks.contains(id) && self.engine().is_some_and(|engine| engine.is_active(id))
    }

    fn cancel_all_scheduled(&self) {
        if let Some(engine) = self.engine() {
            self.inner.tasks.cancel_all(engine.as_ref());
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.inner.id)
            .field("alive", &self.is_alive())
            .field("attributes", &self.attribute_count())
            .field("children", &self.entity_count())
            .field("marks", &*self.inner.marks.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jalse_engine::{ActionContext, ActionResult, ManualEngine};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn root() -> Entity {
        Entity::root_entity(EntityId::random(), None, None)
    }

    fn root_on(engine: Arc<ManualEngine>) -> Entity {
        Entity::root_entity(EntityId::random(), Some(engine), None)
    }

    #[test]
    fn test_children() {
        let house = root();
        let attic = house.new_entity().unwrap();
        let cellar = house.new_entity_with_id(EntityId::named("cellar")).unwrap();

        assert_eq!(house.entity_count(), 2);
        assert_eq!(house.entity_ids(), vec![attic.id(), cellar.id()]);
        assert_eq!(house.get_entity(cellar.id()), Some(cellar.clone()));
        assert_eq!(cellar.parent(), Some(house.clone()));
        assert!(matches!(
            house.new_entity_with_id(cellar.id()),
            Err(Error::DuplicateId(_))
        ));
    }

    #[test]
    fn test_copy_attributes_from_source() {
        let house = root();
        let template = house.new_entity().unwrap();
        template
            .set_attribute("haunted", AttributeType::Bool, true.into())
            .unwrap();
        template
            .set_attribute("ghosts", AttributeType::Int, 2.into())
            .unwrap();

        let copy = house.new_entity_with(None, Some(&template)).unwrap();
        assert_eq!(copy.attributes(), template.attributes());
        copy.set_attribute("ghosts", AttributeType::Int, 5.into())
            .unwrap();
        assert_eq!(
            template.get_attribute("ghosts", AttributeType::Int),
            Some(Value::Int(2))
        );
    }

    #[test]
    fn test_kill_subtree() {
        let house = root();
        let room = house.new_entity().unwrap();
        let ghost = room.new_entity().unwrap();

        assert_eq!(house.find_entity(ghost.id()), Some(ghost.clone()));
        assert!(ghost.is_descendant_of(&house));
        assert!(room.kill());
        assert!(!room.kill());
        assert!(!room.is_alive());
        assert!(!ghost.is_alive());
        assert_eq!(room.entity_count(), 0);
        assert!(house.find_entity(ghost.id()).is_none());
        assert!(matches!(room.new_entity(), Err(Error::Detached(_))));
    }

    #[test]
    fn test_creation_racing_death() {
        let house = root();
        let room = house.new_entity().unwrap();
        let created = Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..200 {
                        match room.new_entity() {
                            Ok(child) => created.lock().push(child),
                            Err(Error::Detached(_)) => break,
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                });
            }
            s.spawn(|| {
                std::thread::yield_now();
                assert!(room.kill());
            });
        });

        assert!(!room.is_alive());
        assert_eq!(room.entity_count(), 0);
        for child in created.lock().iter() {
            assert!(!child.is_alive());
        }
    }

    #[test]
    fn test_marks() {
        let house = root();
        let ghost = house.new_entity().unwrap();
        let ty = EntityTypeId::new("Ghost");
        assert!(ghost.add_mark(ty.clone()));
        assert!(!ghost.add_mark(ty.clone()));
        assert_eq!(house.entities_of_type(&ty), vec![ghost.clone()]);
        assert!(ghost.remove_mark(&ty));
        assert!(house.entities_of_type(&ty).is_empty());
    }

    #[derive(Default)]
    struct Recorder {
        created: AtomicUsize,
        killed: Mutex<Vec<EntityId>>,
    }

    impl EntityListener for Recorder {
        fn entity_created(&self, _entity: &Entity) {
            self.created.fetch_add(1, Ordering::SeqCst);
        }

        fn entity_killed(&self, entity: &Entity) {
            self.killed.lock().push(entity.id());
        }
    }

    #[test]
    fn test_entity_listeners() {
        let house = root();
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn EntityListener> = recorder.clone();
        assert!(house.add_entity_listener(listener.clone()));

        let a = house.new_entity().unwrap();
        let b = house.new_entity().unwrap();
        house.kill_entities();

        assert_eq!(recorder.created.load(Ordering::SeqCst), 2);
        assert_eq!(*recorder.killed.lock(), vec![a.id(), b.id()]);
        assert!(house.remove_entity_listener(&listener));
        house.new_entity().unwrap();
        assert_eq!(recorder.created.load(Ordering::SeqCst), 2);
    }

    fn count_ghosts(ctx: &ActionContext<'_, Entity>) -> ActionResult {
        let n = ctx
            .actor()
            .get_attribute("ghosts", AttributeType::Int)
            .and_then(|v| v.as_int())
            .unwrap_or(0);
        ctx.actor()
            .set_attribute("ghosts", AttributeType::Int, (n + 1).into())?;
        Ok(())
    }

    #[test]
    fn test_schedule_against_entity() {
        let _ = env_logger::builder().is_test(true).try_init();
        let engine = Arc::new(ManualEngine::new(10).unwrap());
        let house = root_on(engine.clone());
        let room = house.new_entity().unwrap();

        let id = room
            .schedule_periodic(count_ghosts, Duration::ZERO, Duration::from_millis(100))
            .unwrap();
        assert!(room.is_active(id));
        engine.step_n(3).unwrap();
        assert_eq!(
            room.get_attribute("ghosts", AttributeType::Int),
            Some(Value::Int(3))
        );

        room.kill();
        assert!(!engine.is_active(id));
        engine.step().unwrap();
        assert_eq!(
            room.get_attribute("ghosts", AttributeType::Int),
            Some(Value::Int(3))
        );
    }

    #[test]
    fn test_schedule_without_engine_fails() {
        let house = root();
        let err = house.schedule(count_ghosts).unwrap_err();
        assert!(matches!(err, jalse_engine::Error::Detached));
    }

    #[test]
    fn test_killing_parent_cancels_child_tasks() {
        let engine = Arc::new(ManualEngine::new(10).unwrap());
        let house = root_on(engine.clone());
        let room = house.new_entity().unwrap();
        let ghost = room.new_entity().unwrap();
        let id = ghost
            .schedule_periodic(count_ghosts, Duration::ZERO, Duration::from_millis(100))
            .unwrap();

        house.kill_entity(room.id());
        assert!(!engine.is_active(id));
        assert!(!ghost.is_alive());
    }
}
