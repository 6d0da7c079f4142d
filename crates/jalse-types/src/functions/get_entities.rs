use super::{erase, expect_no_params, find_annotation, reject_default};
use super::{EntityMethod, EntityMethodFunction};
use crate::decl::{Annotation, MethodSig, TypeRef};
use crate::error::{MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_entity::{EntityContainer, EntityTypeId};
use std::sync::Arc;

/// Lists child entities viewed as an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEntitiesMethod {
    ty: EntityTypeId,
    of_type: bool,
}

impl GetEntitiesMethod {
    pub fn entity_type(&self) -> &EntityTypeId {
        &self.ty
    }

    pub fn is_of_type(&self) -> bool {
        self.of_type
    }
}

impl EntityMethod for GetEntitiesMethod {
    fn invoke(&self, proxy: &EntityProxy, _args: &[Arg]) -> Result<Return> {
        let entities = if self.of_type {
            proxy.entity().entities_of_type(&self.ty)
        } else {
            proxy.entity().entities()
        };
        let viewed = entities
            .iter()
            .map(|e| proxy.types().as_type(e, &self.ty))
            .collect::<Result<Vec<_>>>()?;
        Ok(Return::Entities(viewed))
    }

    fn dependencies(&self) -> Vec<EntityTypeId> {
        vec![self.ty.clone()]
    }
}

/// Resolver for [`Annotation::GetEntities`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GetEntitiesFunction;

impl GetEntitiesFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<GetEntitiesMethod>, MethodError> {
        let Some(of_type) = find_annotation(method, |a| match a {
            Annotation::GetEntities { of_type } => Some(*of_type),
            _ => None,
        }) else {
            return Ok(None);
        };
        reject_default(method)?;
        expect_no_params(method)?;

        let TypeRef::Set(inner) = method.return_type() else {
            return Err(set_of_entities(method));
        };
        let TypeRef::Entity(ty) = inner.as_ref() else {
            return Err(set_of_entities(method));
        };
        Ok(Some(GetEntitiesMethod {
            ty: ty.clone(),
            of_type,
        }))
    }
}

fn set_of_entities(method: &MethodSig) -> MethodError {
    MethodError::ReturnType {
        expected: "a Set of an entity type",
        got: method.return_type().clone(),
    }
}

impl EntityMethodFunction for GetEntitiesFunction {
    fn name(&self) -> &'static str {
        "GetEntities"
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

    fn listing(returns: TypeRef) -> MethodSig {
        MethodSig::new("getGhosts")
            .returns(returns)
            .annotate(Annotation::GetEntities { of_type: false })
    }

    #[test]
    fn test_set_of_entities() {
        let resolved = GetEntitiesFunction
            .resolve(&listing(TypeRef::set(TypeRef::entity("Ghost"))))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.entity_type().as_str(), "Ghost");
        assert!(!resolved.is_of_type());
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            GetEntitiesFunction.resolve(&listing(TypeRef::entity("Ghost"))),
            Err(MethodError::ReturnType { .. })
        ));
        assert!(matches!(
            GetEntitiesFunction.resolve(&listing(TypeRef::set(TypeRef::Id))),
            Err(MethodError::ReturnType { .. })
        ));
        let with_param = listing(TypeRef::set(TypeRef::entity("Ghost"))).param(TypeRef::Id);
        assert!(matches!(
            GetEntitiesFunction.resolve(&with_param),
            Err(MethodError::ParamCount { got: 1, .. })
        ));
    }
}
