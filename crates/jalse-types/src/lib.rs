//! JALSE Types - Typed views over dynamic entities
//!
//! Entities are dynamically typed: they hold attributes and children, and
//! can be viewed through any number of declared entity types. This crate
//! turns those declarations into dispatch tables and hands out proxies.
//!
//! ## Architecture
//!
//! ```text
//! EntityTypeDecl ──register──► EntityTypes ──resolve──► DispatchTable (cached)
//!   MethodSig + Annotation        │                         MethodKey → EntityMethod
//!                                 │
//!                   as_type(entity, type)
//!                                 ▼
//!                            EntityProxy ──invoke(name, args)──► EntityMethod
//!                                                                 │
//!                                    canonical Entity / World operations
//! ```
//!
//! Every method of a type must be claimed by exactly one resolver in
//! [`functions`]. Declarations that break that rule are reported as a
//! single [`ConfigError::InvalidMethods`] listing every offending method.
//!
//! ## Example
//!
//! ```
//! use jalse_engine::ManualEngine;
//! use jalse_entity::{AttributeType, EntityContainer, Value, World};
//! use jalse_types::{Annotation, Arg, EntityTypeDecl, EntityTypes, MethodSig, TypeRef};
//! use std::sync::Arc;
//!
//! let types = EntityTypes::new();
//! types.register(
//!     EntityTypeDecl::new("House")
//!         .method(
//!             MethodSig::new("isHaunted")
//!                 .returns(TypeRef::optional(TypeRef::Value(AttributeType::Bool)))
//!                 .annotate(Annotation::GetAttribute(None)),
//!         )
//!         .method(
//!             MethodSig::new("setHaunted")
//!                 .param(TypeRef::Value(AttributeType::Bool))
//!                 .annotate(Annotation::SetAttribute(None)),
//!         ),
//! )?;
//!
//! let world = World::new(Arc::new(ManualEngine::new(30)?));
//! let house = types.as_type(&world.new_entity()?, &"House".into())?;
//! assert_eq!(house.invoke("isHaunted", &[])?.into_value(), None);
//! house.invoke("setHaunted", &[Arg::from(Value::Bool(true))])?;
//! assert_eq!(house.invoke("isHaunted", &[])?.into_value(), Some(Value::Bool(true)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod decl;
mod error;
pub mod functions;
mod proxy;
mod resolver;

pub use decl::{
    ActionFactory, Annotation, DefaultImpl, EntityTypeDecl, IdSource, MethodKey, MethodSig,
    ScheduleSpec, TypeRef,
};
pub use error::{ConfigError, Error, MethodError, MethodProblem, ProblemKind, Result};
pub use functions::{EntityMethod, EntityMethodFunction};
pub use proxy::{Arg, EntityProxy, Return};
pub use resolver::{DispatchTable, EntityTypes};
