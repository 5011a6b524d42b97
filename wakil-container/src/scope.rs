//! Scope creation.
//!
//! [`ScopeFactory`] is registered automatically as a `Transient` service, so
//! every [`Provider::scope`] call receives a fresh factory bound to the
//! provider that asked for it. Creating any number of scopes never shares
//! factory state.

use std::fmt;

use tracing::debug;

use crate::descriptor::{Arguments, Injectable, Parameter};
use crate::error::Result;
use crate::provider::Provider;

/// Creates child scopes of the provider it was resolved from.
pub struct ScopeFactory {
    provider: Provider,
}

impl ScopeFactory {
    /// Creates a new child provider.
    ///
    /// The child shares the registrations and the root of its parent; its
    /// cache and disposal stack start empty.
    pub fn create_scope(&self) -> Provider {
        let child = self.provider.child();
        debug!(depth = child.depth(), "Created scope");
        child
    }

    /// The provider new scopes descend from.
    pub fn parent(&self) -> &Provider {
        &self.provider
    }
}

impl Injectable for ScopeFactory {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::provider("provider")]
    }

    fn construct(args: &Arguments) -> Result<Self> {
        Ok(ScopeFactory { provider: args.provider("provider")? })
    }
}

impl fmt::Debug for ScopeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeFactory").field("depth", &self.provider.depth()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn factory_is_transient_and_bound_to_requester() {
        let root = Provider::builder().build().unwrap();
        let scope = root.scope().unwrap();

        let a = root.require::<ScopeFactory>().unwrap();
        let b = root.require::<ScopeFactory>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(a.parent().same_scope(&root));
        assert!(scope.require::<ScopeFactory>().unwrap().parent().same_scope(&scope));
    }

    #[test]
    fn scopes_are_independent() {
        let root = Provider::builder().build().unwrap();
        let first = root.scope().unwrap();
        let second = root.scope().unwrap();
        let nested = first.scope().unwrap();

        assert!(!first.same_scope(&second));
        assert_eq!(nested.depth(), 2);
        assert!(nested.root().same_scope(&root));

        first.close();
        assert!(!nested.is_closed());
        assert!(!root.is_closed());
    }
}
