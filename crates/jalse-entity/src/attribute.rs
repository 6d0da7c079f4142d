//! Typed attribute storage and change listeners
//!
//! Attributes are keyed by `(name, AttributeType)`. Listeners subscribe to a
//! single key and are always notified after the store's locks are released,
//! so a listener may freely read or write attributes of the same entity.

use crate::error::{Error, Result};
use crate::identity::EntityId;
use crate::value::{AttributeType, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Key of one attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeKey {
    name: String,
    ty: AttributeType,
}

impl AttributeKey {
    /// Create a key
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute type
    pub fn ty(&self) -> AttributeType {
        self.ty
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.ty)
    }
}

/// What happened to an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeChange {
    Added,
    Changed,
    Removed,
}

/// Notification delivered to an [`AttributeListener`]
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEvent {
    /// Entity owning the attribute
    pub entity: EntityId,
    /// Attribute key
    pub key: AttributeKey,
    /// Value after the change (`None` when removed)
    pub value: Option<Value>,
    /// Value before the change (`None` when added)
    pub previous: Option<Value>,
}

impl AttributeEvent {
    /// Classify the event
    pub fn change(&self) -> AttributeChange {
        match (&self.previous, &self.value) {
            (None, _) => AttributeChange::Added,
            (Some(_), None) => AttributeChange::Removed,
            (Some(_), Some(_)) => AttributeChange::Changed,
        }
    }
}

/// Observer of a single attribute key
pub trait AttributeListener: Send + Sync {
    fn attribute_changed(&self, event: &AttributeEvent);
}

impl<F> AttributeListener for F
where
    F: Fn(&AttributeEvent) + Send + Sync,
{
    fn attribute_changed(&self, event: &AttributeEvent) {
        self(event)
    }
}

/// Canonical attribute operations
///
/// `Option` stands in for absent values: getters return `None` for a missing
/// attribute and setters return the previous value, if any.
pub trait AttributeContainer: Send + Sync {
    /// Get the value of `name` with type `ty`
    fn get_attribute(&self, name: &str, ty: AttributeType) -> Option<Value>;

    /// Set `name` to `value`, returning the previous value
    ///
    /// Fails with [`Error::TypeMismatch`] if `value` is not of type `ty`.
    fn set_attribute(&self, name: &str, ty: AttributeType, value: Value) -> Result<Option<Value>>;

    /// Remove `name`, returning the previous value
    fn remove_attribute(&self, name: &str, ty: AttributeType) -> Option<Value>;

    /// Check whether `name` is set
    fn has_attribute(&self, name: &str, ty: AttributeType) -> bool {
        self.get_attribute(name, ty).is_some()
    }

    /// Every attribute, in insertion order
    fn attributes(&self) -> Vec<(AttributeKey, Value)>;

    /// Number of attributes
    fn attribute_count(&self) -> usize;

    /// Subscribe to changes of one attribute
    fn add_attribute_listener(
        &self,
        name: &str,
        ty: AttributeType,
        listener: Arc<dyn AttributeListener>,
    ) -> bool;

    /// Unsubscribe a listener previously added for the same key
    fn remove_attribute_listener(
        &self,
        name: &str,
        ty: AttributeType,
        listener: &Arc<dyn AttributeListener>,
    ) -> bool;

    /// Notify listeners that a value changed in place
    fn fire_attribute_changed(&self, name: &str, ty: AttributeType);
}

/// In-memory attribute store owned by one entity
pub struct AttributeSet {
    owner: EntityId,
    values: RwLock<IndexMap<AttributeKey, Value>>,
    listeners: RwLock<IndexMap<AttributeKey, Vec<Arc<dyn AttributeListener>>>>,
}

impl AttributeSet {
    /// Create an empty store for `owner`
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            values: RwLock::new(IndexMap::new()),
            listeners: RwLock::new(IndexMap::new()),
        }
    }

    /// Remove every attribute without notifying listeners
    pub fn clear(&self) {
        self.values.write().clear();
    }

    fn notify(&self, key: AttributeKey, value: Option<Value>, previous: Option<Value>) {
        let listeners = match self.listeners.read().get(&key) {
            Some(listeners) if !listeners.is_empty() => listeners.clone(),
            _ => return,
        };
        let event = AttributeEvent {
            entity: self.owner,
            key,
            value,
            previous,
        };
        for listener in listeners {
            listener.attribute_changed(&event);
        }
    }
}

impl AttributeContainer for AttributeSet {
    fn get_attribute(&self, name: &str, ty: AttributeType) -> Option<Value> {
        self.values.read().get(&AttributeKey::new(name, ty)).cloned()
    }

    fn set_attribute(&self, name: &str, ty: AttributeType, value: Value) -> Result<Option<Value>> {
        if !ty.matches(&value) {
            return Err(Error::TypeMismatch {
                name: name.to_string(),
                expected: ty,
                got: value.attribute_type(),
            });
        }
        let key = AttributeKey::new(name, ty);
        let previous = self.values.write().insert(key.clone(), value.clone());
        self.notify(key, Some(value), previous.clone());
        Ok(previous)
    }

    fn remove_attribute(&self, name: &str, ty: AttributeType) -> Option<Value> {
        let key = AttributeKey::new(name, ty);
        let previous = self.values.write().shift_remove(&key);
        if previous.is_some() {
            self.notify(key, None, previous.clone());
        }
        previous
    }

    fn attributes(&self) -> Vec<(AttributeKey, Value)> {
        self.values
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn attribute_count(&self) -> usize {
        self.values.read().len()
    }

    fn add_attribute_listener(
        &self,
        name: &str,
        ty: AttributeType,
        listener: Arc<dyn AttributeListener>,
    ) -> bool {
        let mut listeners = self.listeners.write();
        let entry = listeners.entry(AttributeKey::new(name, ty)).or_default();
        if entry.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        entry.push(listener);
        true
    }

    fn remove_attribute_listener(
        &self,
        name: &str,
        ty: AttributeType,
        listener: &Arc<dyn AttributeListener>,
    ) -> bool {
        let mut listeners = self.listeners.write();
        let Some(entry) = listeners.get_mut(&AttributeKey::new(name, ty)) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|l| !Arc::ptr_eq(l, listener));
        before != entry.len()
    }

    fn fire_attribute_changed(&self, name: &str, ty: AttributeType) {
        if let Some(value) = self.get_attribute(name, ty) {
            self.notify(AttributeKey::new(name, ty), Some(value.clone()), Some(value));
        }
    }
}

impl fmt::Debug for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeSet")
            .field("owner", &self.owner)
            .field("values", &*self.values.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn set() -> AttributeSet {
        AttributeSet::new(EntityId::random())
    }

    #[test]
    fn test_set_get_remove() {
        let attrs = set();
        assert_eq!(attrs.get_attribute("ghosts", AttributeType::Int), None);
        assert_eq!(
            attrs.set_attribute("ghosts", AttributeType::Int, 2.into()).unwrap(),
            None
        );
        assert_eq!(
            attrs.set_attribute("ghosts", AttributeType::Int, 3.into()).unwrap(),
            Some(Value::Int(2))
        );
        assert_eq!(attrs.attribute_count(), 1);
        assert_eq!(
            attrs.remove_attribute("ghosts", AttributeType::Int),
            Some(Value::Int(3))
        );
        assert!(!attrs.has_attribute("ghosts", AttributeType::Int));
    }

    #[test]
    fn test_same_name_different_types() {
        let attrs = set();
        attrs.set_attribute("age", AttributeType::Int, 300.into()).unwrap();
        attrs
            .set_attribute("age", AttributeType::String, "ancient".into())
            .unwrap();
        assert_eq!(attrs.attribute_count(), 2);
        assert_eq!(
            attrs.get_attribute("age", AttributeType::String),
            Some(Value::from("ancient"))
        );
    }

    #[test]
    fn test_type_mismatch() {
        let attrs = set();
        let err = attrs
            .set_attribute("haunted", AttributeType::Bool, Value::Int(1))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: AttributeType::Bool,
                got: AttributeType::Int,
                ..
            }
        ));
        assert_eq!(attrs.attribute_count(), 0);
    }

    #[test]
    fn test_listeners() {
        let attrs = set();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let listener: Arc<dyn AttributeListener> = {
            let seen = seen.clone();
            Arc::new(move |event: &AttributeEvent| seen.lock().push(event.change()))
        };
        assert!(attrs.add_attribute_listener("haunted", AttributeType::Bool, listener.clone()));
        assert!(!attrs.add_attribute_listener("haunted", AttributeType::Bool, listener.clone()));

        attrs.set_attribute("haunted", AttributeType::Bool, true.into()).unwrap();
        attrs.set_attribute("haunted", AttributeType::Bool, false.into()).unwrap();
        attrs.fire_attribute_changed("haunted", AttributeType::Bool);
        attrs.remove_attribute("haunted", AttributeType::Bool);
        // Other keys are not observed.
        attrs.set_attribute("haunted", AttributeType::Int, 1.into()).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                AttributeChange::Added,
                AttributeChange::Changed,
                AttributeChange::Changed,
                AttributeChange::Removed,
            ]
        );

        assert!(attrs.remove_attribute_listener("haunted", AttributeType::Bool, &listener));
        attrs.set_attribute("haunted", AttributeType::Bool, true.into()).unwrap();
        assert_eq!(seen.lock().len(), 4);
    }

    #[test]
    fn test_listener_may_write_back() {
        let attrs = Arc::new(set());
        let listener: Arc<dyn AttributeListener> = {
            let attrs = Arc::downgrade(&attrs);
            Arc::new(move |event: &AttributeEvent| {
                if let (Some(attrs), Some(Value::Int(n))) = (attrs.upgrade(), &event.value) {
                    let _ = attrs.set_attribute("doubled", AttributeType::Int, (n * 2).into());
                }
            })
        };
        attrs.add_attribute_listener("count", AttributeType::Int, listener);
        attrs.set_attribute("count", AttributeType::Int, 21.into()).unwrap();
        assert_eq!(
            attrs.get_attribute("doubled", AttributeType::Int),
            Some(Value::Int(42))
        );
    }
}
