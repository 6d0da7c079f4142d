use super::{erase, expect_no_params, reject_default};
use super::{EntityMethod, EntityMethodFunction};
use crate::decl::{Annotation, MethodSig, TypeRef};
use crate::error::{MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_entity::EntityContainer;
use std::sync::Arc;

/// Kills every child entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillEntitiesMethod;

impl EntityMethod for KillEntitiesMethod {
    fn invoke(&self, proxy: &EntityProxy, _args: &[Arg]) -> Result<Return> {
        proxy.entity().kill_entities();
        Ok(Return::Void)
    }
}

/// Resolver for [`Annotation::KillEntities`]
#[derive(Debug, Clone, Copy, Default)]
pub struct KillEntitiesFunction;

impl KillEntitiesFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<KillEntitiesMethod>, MethodError> {
        if !method
            .annotations()
            .iter()
            .any(|a| matches!(a, Annotation::KillEntities))
        {
            return Ok(None);
        }
        reject_default(method)?;
        expect_no_params(method)?;
        if *method.return_type() != TypeRef::Void {
            return Err(MethodError::ReturnType {
                expected: "void",
                got: method.return_type().clone(),
            });
        }
        Ok(Some(KillEntitiesMethod))
    }
}

impl EntityMethodFunction for KillEntitiesFunction {
    fn name(&self) -> &'static str {
        "KillEntities"
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

    #[test]
    fn test_resolve() {
        let method = MethodSig::new("exorciseAll").annotate(Annotation::KillEntities);
        assert_eq!(
            KillEntitiesFunction.resolve(&method),
            Ok(Some(KillEntitiesMethod))
        );
        assert!(matches!(
            KillEntitiesFunction.resolve(&method.clone().returns(TypeRef::Flag)),
            Err(MethodError::ReturnType { .. })
        ));
        assert!(matches!(
            KillEntitiesFunction.resolve(&method.param(TypeRef::Id)),
            Err(MethodError::ParamCount { .. })
        ));
    }
}
