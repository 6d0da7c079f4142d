use super::{erase, flag_or_void, reject_default, IdSupplier};
use super::{EntityMethod, EntityMethodFunction};
use crate::decl::{Annotation, MethodSig};
use crate::error::{MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_entity::EntityContainer;
use std::sync::Arc;

/// Kills a child entity by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillEntityMethod {
    id: IdSupplier,
    returns_flag: bool,
}

impl KillEntityMethod {
    pub fn id_supplier(&self) -> &IdSupplier {
        &self.id
    }
}

impl EntityMethod for KillEntityMethod {
    fn invoke(&self, proxy: &EntityProxy, args: &[Arg]) -> Result<Return> {
        let id = self.id.get(proxy, args)?;
        let killed = proxy.entity().kill_entity(id);
        Ok(if self.returns_flag {
            Return::Flag(killed)
        } else {
            Return::Void
        })
    }
}

/// Resolver for [`Annotation::KillEntity`]
#[derive(Debug, Clone, Copy, Default)]
pub struct KillEntityFunction;

impl KillEntityFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<KillEntityMethod>, MethodError> {
        if !method
            .annotations()
            .iter()
            .any(|a| matches!(a, Annotation::KillEntity))
        {
            return Ok(None);
        }
        reject_default(method)?;
        let returns_flag = flag_or_void(method)?;
        let id = IdSupplier::for_lookup(method)?;
        Ok(Some(KillEntityMethod { id, returns_flag }))
    }
}

impl EntityMethodFunction for KillEntityFunction {
    fn name(&self) -> &'static str {
        "KillEntity"
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
    use crate::decl::{IdSource, TypeRef};
    use jalse_entity::EntityId;

    #[test]
    fn test_resolve() {
        let method = MethodSig::new("exorcise")
            .param(TypeRef::Id)
            .returns(TypeRef::Flag)
            .annotate(Annotation::KillEntity);
        let resolved = KillEntityFunction.resolve(&method).unwrap().unwrap();
        assert_eq!(resolved.id_supplier(), &IdSupplier::Param(0));

        let conflicting = method.clone().with_id(IdSource::Fixed(EntityId::random()));
        assert_eq!(
            KillEntityFunction.resolve(&conflicting),
            Err(MethodError::ConflictingIdSources)
        );

        let wrong_return = MethodSig::new("exorcise")
            .param(TypeRef::Id)
            .returns(TypeRef::entity("Ghost"))
            .annotate(Annotation::KillEntity);
        assert!(matches!(
            KillEntityFunction.resolve(&wrong_return),
            Err(MethodError::ReturnType { .. })
        ));
    }
}
