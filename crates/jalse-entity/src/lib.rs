//! JALSE Entity - Entities, Attributes and Containers
//!
//! This crate provides the data side of a simulation: entities that carry
//! typed attributes, arranged in a tree under a [`World`].
//!
//! ## Architecture
//!
//! ```text
//! World (root, bound to an Engine)
//!  │
//!  └── Entity[] ← each entity is itself an EntityContainer
//!       ├── AttributeSet   (name, AttributeType) -> Value
//!       ├── marks          EntityTypeId set
//!       ├── listeners      attribute + entity listeners
//!       └── TaskTracker    tasks owned by this entity
//! ```
//!
//! ## Key Components
//!
//! - [`Entity`]: shared handle; schedules actions against itself
//! - [`AttributeContainer`]: canonical attribute operations
//! - [`EntityContainer`]: canonical child-entity operations
//! - [`Value`]: dynamic attribute value, tagged by [`AttributeType`]
//!
//! Killing an entity kills its subtree and cancels every task the subtree
//! owns.

mod attribute;
mod entity;
mod error;
mod identity;
mod value;
mod world;

pub use attribute::{
    AttributeChange, AttributeContainer, AttributeEvent, AttributeKey, AttributeListener,
    AttributeSet,
};
pub use entity::{Entity, EntityContainer, EntityListener};
pub use error::{Error, Result};
pub use identity::{EntityId, EntityTypeId};
pub use value::{AttributeType, Value, ValueMap};
pub use world::World;
