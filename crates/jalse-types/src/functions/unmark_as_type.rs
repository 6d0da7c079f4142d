use super::{erase, expect_no_params, flag_or_void, find_annotation, reject_default};
use super::{EntityMethod, EntityMethodFunction};
use crate::decl::{Annotation, MethodSig};
use crate::error::{MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_entity::EntityTypeId;
use std::sync::Arc;

/// Removes a type mark, along with the marks of every descendant type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmarkAsTypeMethod {
    ty: EntityTypeId,
    returns_flag: bool,
}

impl UnmarkAsTypeMethod {
    pub fn entity_type(&self) -> &EntityTypeId {
        &self.ty
    }
}

impl EntityMethod for UnmarkAsTypeMethod {
    fn invoke(&self, proxy: &EntityProxy, _args: &[Arg]) -> Result<Return> {
        let changed = proxy.types().unmark_as_type(proxy.entity(), &self.ty)?;
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

/// Resolver for [`Annotation::UnmarkAsType`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnmarkAsTypeFunction;

impl UnmarkAsTypeFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<UnmarkAsTypeMethod>, MethodError> {
        let Some(ty) = find_annotation(method, |a| match a {
            Annotation::UnmarkAsType(ty) => Some(ty.clone()),
            _ => None,
        }) else {
            return Ok(None);
        };
        reject_default(method)?;
        expect_no_params(method)?;
        let returns_flag = flag_or_void(method)?;
        Ok(Some(UnmarkAsTypeMethod { ty, returns_flag }))
    }
}

impl EntityMethodFunction for UnmarkAsTypeFunction {
    fn name(&self) -> &'static str {
        "UnmarkAsType"
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
    use jalse_entity::AttributeType;

    #[test]
    fn test_resolve() {
        let method =
            MethodSig::new("cleanse").annotate(Annotation::UnmarkAsType("Haunted".into()));
        assert!(UnmarkAsTypeFunction.resolve(&method).unwrap().is_some());

        let wrong = method.clone().returns(TypeRef::Value(AttributeType::Bool));
        assert!(matches!(
            UnmarkAsTypeFunction.resolve(&wrong),
            Err(MethodError::ReturnType { .. })
        ));
        let default = method.default_impl(|_, _| Ok(Return::Void));
        assert_eq!(
            UnmarkAsTypeFunction.resolve(&default),
            Err(MethodError::DefaultNotAllowed)
        );
    }
}
