use super::{erase, EntityMethod, EntityMethodFunction};
use crate::decl::{DefaultImpl, MethodSig};
use crate::error::{MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use std::fmt;
use std::sync::Arc;

/// Runs a method's own implementation against the proxy
#[derive(Clone)]
pub struct DefaultMethod {
    body: DefaultImpl,
}

impl EntityMethod for DefaultMethod {
    fn invoke(&self, proxy: &EntityProxy, args: &[Arg]) -> Result<Return> {
        (self.body)(proxy, args)
    }
}

impl fmt::Debug for DefaultMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultMethod")
    }
}

/// Claims every method declared with a default implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMethodFunction;

impl DefaultMethodFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<DefaultMethod>, MethodError> {
        Ok(method
            .default_body()
            .map(|body| DefaultMethod { body: body.clone() }))
    }
}

impl EntityMethodFunction for DefaultMethodFunction {
    fn name(&self) -> &'static str {
        "DefaultMethod"
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
    fn test_claims_only_default_methods() {
        let plain = MethodSig::new("describe");
        assert!(matches!(DefaultMethodFunction.resolve(&plain), Ok(None)));

        let default = plain.default_impl(|_, _| Ok(Return::Flag(true)));
        assert!(matches!(DefaultMethodFunction.resolve(&default), Ok(Some(_))));
    }
}
