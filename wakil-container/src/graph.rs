//! Build-time walk over declared constructor parameters.
//!
//! Walks the bound parameter tables of a compiled [`Registry`] without
//! constructing anything:
//! - no key reaches itself through parameters
//! - every parameter key has a registration
//! - no singleton captures a shorter-lived service
//!
//! Runs only when [`ContainerBuilder::validate`](crate::builder::ContainerBuilder::validate)
//! is called; resolution behaves the same either way.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};
use wakil_support::rendering::suggest_similar;

use crate::descriptor::Descriptor;
use crate::error::{
    CircularDependencyError, NotRegisteredError, ScopeMismatchError, WakilError,
};
use crate::key::ServiceKey;
use crate::provider::Provider;
use crate::registry::Registry;
use crate::scope::ScopeFactory;

/// Depth-first walk over the registration map.
///
/// Maintains the current path to report cycles and "required by".
pub(crate) struct GraphValidator<'a> {
    registry: &'a Registry,
    /// Keys whose parameters are still being walked.
    visiting: HashSet<ServiceKey>,
    /// Already validated
    validated: HashSet<ServiceKey>,
    /// Keys on the walk from the current root.
    path: Vec<ServiceKey>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates every registered service.
    ///
    /// # Errors
    /// - [`WakilError::CircularDependency`]: cycle detected
    /// - [`WakilError::NotRegistered`]: missing dependency
    /// - [`WakilError::ScopeMismatch`]: singleton consuming a shorter-lived service
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<(), WakilError> {
        let keys = self.registry.registered_keys();
        debug!(services = keys.len(), "Starting dependency graph validation");

        for key in keys {
            let target = self.registry.route(&key).key;
            self.visit(target)?;
        }

        debug!("Dependency graph validation passed");
        Ok(())
    }

    /// Validates every registration of a canonical key.
    fn visit(&mut self, key: ServiceKey) -> Result<(), WakilError> {
        if self.validated.contains(&key) {
            return Ok(());
        }

        if self.visiting.contains(&key) {
            let start = self.path.iter().position(|k| *k == key).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(key);

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(WakilError::CircularDependency(CircularDependencyError { chain }));
        }

        let registry = self.registry;
        let Some(descriptors) = registry.registered(&key) else {
            return Err(self.missing(key));
        };

        self.visiting.insert(key);
        self.path.push(key);

        for descriptor in descriptors {
            for parameter in descriptor.parameters() {
                self.visit_dependency(descriptor, parameter.key)?;
            }
        }

        self.path.pop();
        self.visiting.remove(&key);
        self.validated.insert(key);
        Ok(())
    }

    fn visit_dependency(&mut self, consumer: &Descriptor, dependency: ServiceKey) -> Result<(), WakilError> {
        let registry = self.registry;
        let target = registry.route(&dependency.element()).key;

        // Resolved per request, so capturing them is harmless.
        if target.is::<Provider>() || target.is::<ScopeFactory>() {
            return Ok(());
        }

        match registry.registered(&target) {
            Some(descriptors) => {
                let captured: &[Descriptor] = if dependency.is_list() {
                    descriptors
                } else {
                    &descriptors[descriptors.len() - 1..]
                };
                for candidate in captured {
                    check_capture(consumer, candidate)?;
                }
                self.visit(target)
            }
            // A list of nothing resolves to an empty list.
            None if dependency.is_list() => Ok(()),
            None => Err(self.missing(dependency)),
        }
    }

    fn missing(&self, key: ServiceKey) -> WakilError {
        let names: Vec<&str> = self
            .registry
            .registered_keys()
            .iter()
            .map(ServiceKey::type_name)
            .collect();

        WakilError::NotRegistered(NotRegisteredError {
            requested: key,
            required_by: self.path.last().copied(),
            suggestions: suggest_similar(key.type_name(), &names, 3),
        })
    }
}

/// A singleton may only consume services that live at least as long.
fn check_capture(consumer: &Descriptor, dependency: &Descriptor) -> Result<(), WakilError> {
    let consumer_lifetime = consumer.lifetime();
    let dependency_lifetime = dependency.lifetime();
    if !consumer_lifetime.is_singleton() || !consumer_lifetime.outlives(dependency_lifetime) {
        return Ok(());
    }

    warn!(
        consumer = %consumer.service(),
        consumer_lifetime = %consumer_lifetime,
        dependency = %dependency.service(),
        dependency_lifetime = %dependency_lifetime,
        "Scope mismatch detected"
    );

    Err(WakilError::ScopeMismatch(ScopeMismatchError {
        dependency: dependency.service(),
        dependency_lifetime,
        consumer: consumer.service(),
        consumer_lifetime,
    }))
}
