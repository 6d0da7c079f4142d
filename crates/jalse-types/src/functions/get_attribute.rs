use super::{derive_name, erase, expect_no_params, find_annotation, reject_default};
use super::{EntityMethod, EntityMethodFunction};
use crate::decl::{Annotation, MethodSig, TypeRef};
use crate::error::{MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_entity::{AttributeContainer, AttributeType};
use std::sync::Arc;

/// Reads an attribute of the proxied entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAttributeMethod {
    name: String,
    ty: AttributeType,
    optional: bool,
}

impl GetAttributeMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.ty
    }

    /// True if declared as returning `Optional<T>`
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

impl EntityMethod for GetAttributeMethod {
    fn invoke(&self, proxy: &EntityProxy, _args: &[Arg]) -> Result<Return> {
        Ok(Return::Value(proxy.entity().get_attribute(&self.name, self.ty)))
    }
}

/// Resolver for [`Annotation::GetAttribute`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GetAttributeFunction;

impl GetAttributeFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<GetAttributeMethod>, MethodError> {
        let Some(explicit) = find_annotation(method, |a| match a {
            Annotation::GetAttribute(name) => Some(name),
            _ => None,
        }) else {
            return Ok(None);
        };
        reject_default(method)?;
        expect_no_params(method)?;

        let (ty, optional) = match method.return_type().unwrap_optional() {
            (TypeRef::Value(ty), optional) => (*ty, optional),
            (TypeRef::Void, false) => {
                return Err(MethodError::ReturnType {
                    expected: "an attribute value or Option of one",
                    got: TypeRef::Void,
                })
            }
            _ => return Err(MethodError::NotAValueType(method.return_type().clone())),
        };

        let name = match explicit {
            Some(name) if !name.is_empty() => name.clone(),
            _ => derive_name(method.name(), &["get", "is"]).ok_or(MethodError::NoName)?,
        };

        Ok(Some(GetAttributeMethod { name, ty, optional }))
    }
}

impl EntityMethodFunction for GetAttributeFunction {
    fn name(&self) -> &'static str {
        "GetAttribute"
    }

    fn apply(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<Arc<dyn EntityMethod>>, MethodError> {
        erase(self.resolve(method))
    }
}
