//! Identity types for entities and entity types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generate a random (v4) id
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a stable (v5) id from a name
    ///
    /// The same name always yields the same id.
    pub fn named(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Identifier of an entity type
///
/// Entity types are declared by name; marks on an entity record these ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityTypeId(pub String);

impl EntityTypeId {
    /// Create a new entity type id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityTypeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityTypeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id() {
        let id = EntityId::random();
        assert_ne!(id, EntityId::random());
        assert!(id.to_string().starts_with("entity:"));
    }

    #[test]
    fn test_named_ids_are_stable() {
        assert_eq!(EntityId::named("attic"), EntityId::named("attic"));
        assert_ne!(EntityId::named("attic"), EntityId::named("cellar"));
    }

    #[test]
    fn test_entity_type_id() {
        let id = EntityTypeId::new("Ghost");
        assert_eq!(id.as_str(), "Ghost");
        assert_eq!(format!("{}", id), "Ghost");
        assert_eq!(EntityTypeId::from("Ghost"), id);
    }
}
