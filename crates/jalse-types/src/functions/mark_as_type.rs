use super::{erase, expect_no_params, flag_or_void, find_annotation, reject_default};
use super::{EntityMethod, EntityMethodFunction};
use crate::decl::{Annotation, MethodSig};
use crate::error::{MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_entity::EntityTypeId;
use std::sync::Arc;

/// Marks the proxied entity as a type and all of its ancestors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkAsTypeMethod {
    ty: EntityTypeId,
    returns_flag: bool,
}

impl MarkAsTypeMethod {
    pub fn entity_type(&self) -> &EntityTypeId {
        &self.ty
    }
}

impl EntityMethod for MarkAsTypeMethod {
    fn invoke(&self, proxy: &EntityProxy, _args: &[Arg]) -> Result<Return> {
        let changed = proxy.types().mark_as_type(proxy.entity(), &self.ty)?;
        Ok(if self.returns_flag {
            Return::Flag(changed)
        } else {
            Return::Void
        })
    }

    fn dependencies(&self) -> Vec<EntityTypeId> {
        vec![self.ty.clone()]
    }
}

/// Resolver for [`Annotation::MarkAsType`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkAsTypeFunction;

impl MarkAsTypeFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<MarkAsTypeMethod>, MethodError> {
        let Some(ty) = find_annotation(method, |a| match a {
            Annotation::MarkAsType(ty) => Some(ty.clone()),
            _ => None,
        }) else {
            return Ok(None);
        };
        reject_default(method)?;
        expect_no_params(method)?;
        let returns_flag = flag_or_void(method)?;
        Ok(Some(MarkAsTypeMethod { ty, returns_flag }))
    }
}

impl EntityMethodFunction for MarkAsTypeFunction {
    fn name(&self) -> &'static str {
        "MarkAsType"
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
    use crate::decl::TypeRef;

    #[test]
    fn test_resolve() {
        let method = MethodSig::new("haunt")
            .returns(TypeRef::Flag)
            .annotate(Annotation::MarkAsType("Haunted".into()));
        let resolved = MarkAsTypeFunction.resolve(&method).unwrap().unwrap();
        assert_eq!(resolved.entity_type().as_str(), "Haunted");
        assert_eq!(resolved.dependencies(), vec![EntityTypeId::from("Haunted")]);

        assert!(matches!(
            MarkAsTypeFunction.resolve(&method.param(TypeRef::Id)),
            Err(MethodError::ParamCount { got: 1, .. })
        ));
    }
}
