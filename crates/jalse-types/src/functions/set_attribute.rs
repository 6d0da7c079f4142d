use super::{derive_name, erase, find_annotation, reject_default};
use super::{EntityMethod, EntityMethodFunction};
use crate::decl::{Annotation, MethodSig, TypeRef};
use crate::error::{Error, MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use jalse_entity::{AttributeContainer, AttributeType};
use std::sync::Arc;

/// Writes (or, given no value, removes) an attribute of the proxied entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetAttributeMethod {
    name: String,
    ty: AttributeType,
    returns_previous: bool,
}

impl SetAttributeMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.ty
    }

    /// True unless declared `void`
    pub fn returns_previous(&self) -> bool {
        self.returns_previous
    }
}

impl EntityMethod for SetAttributeMethod {
    fn invoke(&self, proxy: &EntityProxy, args: &[Arg]) -> Result<Return> {
        let entity = proxy.entity();
        let previous = match args {
            [Arg::Value(Some(value))] => {
                entity.set_attribute(&self.name, self.ty, value.clone())?
            }
            [Arg::Value(None)] => entity.remove_attribute(&self.name, self.ty),
            _ => {
                return Err(Error::ArgumentMismatch {
                    ty: proxy.entity_type().clone(),
                    name: self.name.clone(),
                })
            }
        };
        Ok(if self.returns_previous {
            Return::Value(previous)
        } else {
            Return::Void
        })
    }
}

/// Resolver for [`Annotation::SetAttribute`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SetAttributeFunction;

impl SetAttributeFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<SetAttributeMethod>, MethodError> {
        let Some(explicit) = find_annotation(method, |a| match a {
            Annotation::SetAttribute(name) => Some(name),
            _ => None,
        }) else {
            return Ok(None);
        };
        reject_default(method)?;

        let ty = match method.params() {
            [TypeRef::Value(ty)] => *ty,
            [other] => return Err(MethodError::NotAValueType(other.clone())),
            params => {
                return Err(MethodError::ParamCount {
                    expected: "exactly one",
                    got: params.len(),
                })
            }
        };

        let returns_previous = match method.return_type() {
            TypeRef::Void => false,
            ret => match ret.unwrap_optional() {
                (TypeRef::Value(r), _) if *r == ty => true,
                _ => {
                    return Err(MethodError::ReturnType {
                        expected: "void, the parameter type or Option of it",
                        got: ret.clone(),
                    })
                }
            },
        };

        let name = match explicit {
            Some(name) if !name.is_empty() => name.clone(),
            _ => derive_name(method.name(), &["set"]).ok_or(MethodError::NoName)?,
        };

        Ok(Some(SetAttributeMethod {
            name,
            ty,
            returns_previous,
        }))
    }
}

impl EntityMethodFunction for SetAttributeFunction {
    fn name(&self) -> &'static str {
        "SetAttribute"
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

    fn setter(name: &str, param: TypeRef, returns: TypeRef) -> MethodSig {
        MethodSig::new(name)
            .param(param)
            .returns(returns)
            .annotate(Annotation::SetAttribute(None))
    }

    #[test]
    fn test_name_derivation() {
        let int = TypeRef::Value(AttributeType::Int);
        let resolved = SetAttributeFunction
            .resolve(&setter("setX", int.clone(), TypeRef::Void))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.name(), "x");
        assert!(!resolved.returns_previous());

        assert_eq!(
            SetAttributeFunction.resolve(&setter("x", int.clone(), TypeRef::Void)),
            Err(MethodError::NoName)
        );
        // Getter prefixes do not apply to setters.
        assert_eq!(
            SetAttributeFunction.resolve(&setter("getX", int, TypeRef::Void)),
            Err(MethodError::NoName)
        );
    }

    #[test]
    fn test_return_types() {
        let int = TypeRef::Value(AttributeType::Int);
        for returns in [int.clone(), TypeRef::optional(int.clone())] {
            let resolved = SetAttributeFunction
                .resolve(&setter("setX", int.clone(), returns))
                .unwrap()
                .unwrap();
            assert!(resolved.returns_previous());
        }
        assert!(matches!(
            SetAttributeFunction.resolve(&setter(
                "setX",
                int.clone(),
                TypeRef::Value(AttributeType::String)
            )),
            Err(MethodError::ReturnType { .. })
        ));
        assert!(matches!(
            SetAttributeFunction.resolve(&setter("setX", int, TypeRef::Flag)),
            Err(MethodError::ReturnType { .. })
        ));
    }

    #[test]
    fn test_parameter_rules() {
        assert_eq!(
            SetAttributeFunction.resolve(&setter("setX", TypeRef::Flag, TypeRef::Void)),
            Err(MethodError::NotAValueType(TypeRef::Flag))
        );
        let none = MethodSig::new("setX").annotate(Annotation::SetAttribute(None));
        assert_eq!(
            SetAttributeFunction.resolve(&none),
            Err(MethodError::ParamCount {
                expected: "exactly one",
                got: 0
            })
        );
    }
}
