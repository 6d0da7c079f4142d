use super::{entity_return, erase, find_annotation, reject_default, IdSupplier};
use super::{EntityMethod, EntityMethodFunction};
use crate::decl::{Annotation, MethodSig};
use crate::error::{MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_entity::{EntityContainer, EntityTypeId};
use std::sync::Arc;

/// Looks up a child entity and views it as an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEntityMethod {
    ty: EntityTypeId,
    optional: bool,
    of_type: bool,
    id: IdSupplier,
}

impl GetEntityMethod {
    pub fn entity_type(&self) -> &EntityTypeId {
        &self.ty
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// True if only entities marked as the type are returned
    pub fn is_of_type(&self) -> bool {
        self.of_type
    }

    pub fn id_supplier(&self) -> &IdSupplier {
        &self.id
    }
}

impl EntityMethod for GetEntityMethod {
    fn invoke(&self, proxy: &EntityProxy, args: &[Arg]) -> Result<Return> {
        let id = self.id.get(proxy, args)?;
        let found = proxy
            .entity()
            .get_entity(id)
            .filter(|e| !self.of_type || e.is_marked_as(&self.ty));
        let viewed = match found {
            Some(entity) => Some(proxy.types().as_type(&entity, &self.ty)?),
            None => None,
        };
        Ok(Return::Entity(viewed))
    }

    fn dependencies(&self) -> Vec<EntityTypeId> {
        vec![self.ty.clone()]
    }
}

/// Resolver for [`Annotation::GetEntity`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GetEntityFunction;

impl GetEntityFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<GetEntityMethod>, MethodError> {
        let Some(of_type) = find_annotation(method, |a| match a {
            Annotation::GetEntity { of_type } => Some(*of_type),
            _ => None,
        }) else {
            return Ok(None);
        };
        reject_default(method)?;

        let (ty, optional) =
            entity_return(method.return_type()).ok_or_else(|| MethodError::ReturnType {
                expected: "an entity type or Option of one",
                got: method.return_type().clone(),
            })?;
        let id = IdSupplier::for_lookup(method)?;

        Ok(Some(GetEntityMethod {
            ty,
            optional,
            of_type,
            id,
        }))
    }
}

impl EntityMethodFunction for GetEntityFunction {
    fn name(&self) -> &'static str {
        "GetEntity"
    }

    fn apply(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<Arc<dyn EntityMethod>>, MethodError> {
        erase(self.resolve(method))
    }
}
