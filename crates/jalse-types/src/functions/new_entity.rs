use super::{erase, reject_default, IdSupplier};
use super::{EntityMethod, EntityMethodFunction};
use crate::decl::{Annotation, MethodSig, TypeRef};
use crate::error::{Error, MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_entity::{EntityContainer, EntityTypeId};
use std::sync::Arc;

/// Creates a child entity, optionally with a given id and copied attributes
///
/// When the method returns an entity type the new entity is marked as that
/// type before it is handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntityMethod {
    id: Option<IdSupplier>,
    container: Option<usize>,
    ty: Option<EntityTypeId>,
}

impl NewEntityMethod {
    /// Where the new id comes from; `None` for a random id
    pub fn id_supplier(&self) -> Option<&IdSupplier> {
        self.id.as_ref()
    }

    /// True if attributes are copied from a container argument
    pub fn copies_container(&self) -> bool {
        self.container.is_some()
    }

    pub fn entity_type(&self) -> Option<&EntityTypeId> {
        self.ty.as_ref()
    }
}

impl EntityMethod for NewEntityMethod {
    fn invoke(&self, proxy: &EntityProxy, args: &[Arg]) -> Result<Return> {
        let id = match &self.id {
            Some(supplier) => Some(supplier.get(proxy, args)?),
            None => None,
        };
        let container = match self.container {
            Some(index) => Some(args.get(index).and_then(Arg::as_container).ok_or_else(
                || Error::ArgumentMismatch {
                    ty: proxy.entity_type().clone(),
                    name: format!("<container argument {}>", index),
                },
            )?),
            None => None,
        };

        // The type must resolve before a child exists to hand out.
        if let Some(ty) = &self.ty {
            proxy.types().resolve(ty)?;
        }
        let entity = proxy.entity().new_entity_with(id, container)?;
        let Some(ty) = &self.ty else {
            return Ok(Return::Void);
        };
        let typed = proxy
            .types()
            .mark_as_type(&entity, ty)
            .and_then(|_| proxy.types().as_type(&entity, ty));
        match typed {
            Ok(typed) => Ok(Return::Entity(Some(typed))),
            Err(e) => {
                proxy.entity().kill_entity(entity.id());
                Err(e)
            }
        }
    }

    fn dependencies(&self) -> Vec<EntityTypeId> {
        self.ty.iter().cloned().collect()
    }
}

/// Resolver for [`Annotation::NewEntity`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NewEntityFunction;

impl NewEntityFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<NewEntityMethod>, MethodError> {
        if !method
            .annotations()
            .iter()
            .any(|a| matches!(a, Annotation::NewEntity))
        {
            return Ok(None);
        }
        reject_default(method)?;

        let (id_param, container) = match method.params() {
            [] => (None, None),
            [TypeRef::Id] => (Some(0), None),
            [TypeRef::Container] => (None, Some(0)),
            [TypeRef::Id, TypeRef::Container] => (Some(0), Some(1)),
            [other] => {
                return Err(MethodError::ParamType {
                    index: 0,
                    expected: "an entity id or a container",
                    got: other.clone(),
                })
            }
            [TypeRef::Id, other] => {
                return Err(MethodError::ParamType {
                    index: 1,
                    expected: "a container",
                    got: other.clone(),
                })
            }
            [other, _] => {
                return Err(MethodError::ParamType {
                    index: 0,
                    expected: "an entity id",
                    got: other.clone(),
                })
            }
            params => {
                return Err(MethodError::ParamCount {
                    expected: "at most two",
                    got: params.len(),
                })
            }
        };

        let id = match (id_param, method.id_source()) {
            (Some(_), Some(_)) => return Err(MethodError::ConflictingIdSources),
            (Some(index), None) => Some(IdSupplier::Param(index)),
            (None, Some(source)) => source.fixed_id().map(IdSupplier::Fixed),
            (None, None) => None,
        };

        let ty = match method.return_type() {
            TypeRef::Void => None,
            TypeRef::Entity(ty) => Some(ty.clone()),
            other => {
                return Err(MethodError::ReturnType {
                    expected: "an entity type or void",
                    got: other.clone(),
                })
            }
        };

        Ok(Some(NewEntityMethod { id, container, ty }))
    }
}

impl EntityMethodFunction for NewEntityFunction {
    fn name(&self) -> &'static str {
        "NewEntity"
    }

    fn apply(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<Arc<dyn EntityMethod>>, MethodError> {
        erase(self.resolve(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{EntityTypeDecl, IdSource};
    use crate::error::ConfigError;
    use crate::resolver::EntityTypes;
    use jalse_entity::{AttributeType, EntityId, World};

    fn creator(params: &[TypeRef]) -> MethodSig {
        params.iter().fold(
            MethodSig::new("newGhost")
                .returns(TypeRef::entity("Ghost"))
                .annotate(Annotation::NewEntity),
            |m, p| m.param(p.clone()),
        )
    }

    #[test]
    fn test_accepted_shapes() {
        let shapes: [(&[TypeRef], bool, bool); 4] = [
            (&[], false, false),
            (&[TypeRef::Id], true, false),
            (&[TypeRef::Container], false, true),
            (&[TypeRef::Id, TypeRef::Container], true, true),
        ];
        for (params, has_id, copies) in shapes {
            let resolved = NewEntityFunction.resolve(&creator(params)).unwrap().unwrap();
            assert_eq!(resolved.id_supplier().is_some(), has_id);
            assert_eq!(resolved.copies_container(), copies);
            assert_eq!(resolved.entity_type(), Some(&EntityTypeId::from("Ghost")));
        }
    }

    #[test]
    fn test_rejected_shapes() {
        assert!(matches!(
            NewEntityFunction.resolve(&creator(&[TypeRef::Container, TypeRef::Id])),
            Err(MethodError::ParamType { index: 0, .. })
        ));
        assert!(matches!(
            NewEntityFunction.resolve(&creator(&[TypeRef::Id, TypeRef::Id])),
            Err(MethodError::ParamType { index: 1, .. })
        ));
        assert!(matches!(
            NewEntityFunction.resolve(&creator(&[TypeRef::Value(AttributeType::Int)])),
            Err(MethodError::ParamType { index: 0, .. })
        ));
        assert!(matches!(
            NewEntityFunction.resolve(&creator(&[
                TypeRef::Id,
                TypeRef::Container,
                TypeRef::Container
            ])),
            Err(MethodError::ParamCount { got: 3, .. })
        ));
        let bad_return = creator(&[]).returns(TypeRef::Flag);
        assert!(matches!(
            NewEntityFunction.resolve(&bad_return),
            Err(MethodError::ReturnType { .. })
        ));
    }

    #[test]
    fn test_id_annotation() {
        let fixed = EntityId::random();
        let resolved = NewEntityFunction
            .resolve(&creator(&[]).with_id(IdSource::Fixed(fixed)))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id_supplier(), Some(&IdSupplier::Fixed(fixed)));

        let random = NewEntityFunction
            .resolve(&creator(&[]).with_id(IdSource::Random))
            .unwrap()
            .unwrap();
        assert_eq!(random.id_supplier(), None);

        assert_eq!(
            NewEntityFunction.resolve(&creator(&[TypeRef::Id]).with_id(IdSource::Fixed(fixed))),
            Err(MethodError::ConflictingIdSources)
        );
    }

    #[test]
    fn test_failed_creation_leaves_no_child() {
        let types = EntityTypes::new();
        // Registered, but its only method is not claimed by any resolver.
        types
            .register(EntityTypeDecl::new("Ghost").method(MethodSig::new("rattle")))
            .unwrap();
        types
            .register(EntityTypeDecl::new("House").method(creator(&[])))
            .unwrap();

        let world = World::unbound();
        let house = types
            .as_type(&world.new_entity().unwrap(), &"House".into())
            .unwrap();
        let err = house.invoke("newGhost", &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidMethods { .. })
        ));
        assert_eq!(house.entity().entity_count(), 0);
    }

    #[test]
    fn test_created_child_is_marked() {
        let types = EntityTypes::new();
        types.register(EntityTypeDecl::new("Ghost")).unwrap();
        types
            .register(EntityTypeDecl::new("House").method(creator(&[TypeRef::Id])))
            .unwrap();

        let world = World::unbound();
        let house = types
            .as_type(&world.new_entity().unwrap(), &"House".into())
            .unwrap();
        let casper = EntityId::named("casper");
        let ghost = house
            .invoke("newGhost", &[casper.into()])
            .unwrap()
            .into_entity()
            .unwrap();
        assert_eq!(ghost.id(), casper);
        assert_eq!(ghost.entity_type().as_str(), "Ghost");
        assert!(ghost.entity().is_marked_as(&"Ghost".into()));
        assert_eq!(house.entity().entity_count(), 1);
    }
}
