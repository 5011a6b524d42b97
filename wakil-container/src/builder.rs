//! # The Builder: registration surface
//!
//! Registrations are appended in order; [`ContainerBuilder::build`]
//! compiles them into a [`Registry`] and returns a fresh root
//! [`Provider`].
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use wakil_container::prelude::*;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) -> String { format!("[console] {msg}") }
//! }
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! let provider = Provider::builder()
//!     .singleton_with::<dyn Logger>([], |_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>))
//!     .transient_with::<UserService>([Parameter::of::<dyn Logger>("logger")], |args| {
//!         Ok(Arc::new(UserService { logger: args.get("logger")? }))
//!     })
//!     .build()
//!     .expect("Failed to build container");
//!
//! let service = provider.require::<UserService>().expect("Failed to resolve");
//! assert_eq!(service.logger.log("hi"), "[console] hi");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::descriptor::{
    Arguments, Descriptor, Injectable, NameBindings, Parameter, Upcast, disposable_constructor,
    factory_constructor, injectable_constructor,
};
use crate::dispose::Disposable;
use crate::error::{ConfigurationError, Result};
use crate::graph::GraphValidator;
use crate::key::{Instance, ServiceKey};
use crate::lifetime::Lifetime;
use crate::lock::{Lock, NoopLock, ReentrantLock};
use crate::module::Module;
use crate::provider::Provider;
use crate::registry::{Alias, Registry};
use crate::scope::ScopeFactory;
use crate::validator::{TypeValidator, Validator};

/// Accumulates registrations and builds root providers.
///
/// Configuration errors are recorded as they happen and reported by
/// [`build`](ContainerBuilder::build), so registration calls chain freely.
///
/// ```rust,ignore
/// let provider = Provider::builder()
///     .instance(Arc::new(Config::load()))
///     .singleton::<Database>()
///     .scoped_as::<dyn Repository, SqlRepository>()
///     .build()?;
/// ```
pub struct ContainerBuilder {
    descriptors: Vec<Descriptor>,
    aliases: HashMap<ServiceKey, Alias>,
    bindings: NameBindings,
    errors: Vec<ConfigurationError>,
}

impl ContainerBuilder {
    /// A builder holding only the default [`Validator`] and [`Lock`].
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            aliases: HashMap::new(),
            bindings: NameBindings::new(),
            errors: Vec::new(),
        }
        .singleton_with::<dyn Validator>([], |_| Ok(Arc::new(TypeValidator) as Arc<dyn Validator>))
        .singleton_with::<dyn Lock>([], |_| Ok(Arc::new(NoopLock) as Arc<dyn Lock>))
    }

    /// Appends a ready-made descriptor.
    pub fn add(mut self, descriptor: Descriptor) -> Self {
        debug!(
            service = %descriptor.service(),
            lifetime = %descriptor.lifetime(),
            "Registered"
        );
        self.descriptors.push(descriptor);
        self
    }

    // ── Constructible types ──

    /// Registers `I`, constructed through [`Injectable`], as service `S`.
    pub fn add_type<S, I>(self, lifetime: Lifetime) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<S>,
    {
        let descriptor = Descriptor::construct(
            ServiceKey::of::<S>(),
            lifetime,
            I::parameters(),
            &self.bindings,
            injectable_constructor::<S, I>(),
        );
        self.record(descriptor)
    }

    pub fn singleton<T: Injectable>(self) -> Self {
        self.add_type::<T, T>(Lifetime::Singleton)
    }

    pub fn scoped<T: Injectable>(self) -> Self {
        self.add_type::<T, T>(Lifetime::Scoped)
    }

    pub fn transient<T: Injectable>(self) -> Self {
        self.add_type::<T, T>(Lifetime::Transient)
    }

    /// Registers implementation `I` under service `S`, usually a trait object.
    ///
    /// ```rust,ignore
    /// wakil::upcast!(SmtpMailer => dyn Mailer);
    /// builder.singleton_as::<dyn Mailer, SmtpMailer>();
    /// ```
    pub fn singleton_as<S, I>(self) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<S>,
    {
        self.add_type::<S, I>(Lifetime::Singleton)
    }

    pub fn scoped_as<S, I>(self) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<S>,
    {
        self.add_type::<S, I>(Lifetime::Scoped)
    }

    pub fn transient_as<S, I>(self) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<S>,
    {
        self.add_type::<S, I>(Lifetime::Transient)
    }

    // ── Factories ──

    /// Registers a factory for `S` taking the declared `parameters`.
    pub fn add_with<S: ?Sized + Send + Sync + 'static>(
        self,
        lifetime: Lifetime,
        parameters: impl IntoIterator<Item = Parameter>,
        factory: impl Fn(&Arguments) -> Result<Arc<S>> + Send + Sync + 'static,
    ) -> Self {
        let descriptor = Descriptor::construct(
            ServiceKey::of::<S>(),
            lifetime,
            parameters,
            &self.bindings,
            factory_constructor::<S, Arc<S>, _>(factory),
        );
        self.record(descriptor)
    }

    /// Factory called once, against the root provider.
    pub fn singleton_with<S: ?Sized + Send + Sync + 'static>(
        self,
        parameters: impl IntoIterator<Item = Parameter>,
        factory: impl Fn(&Arguments) -> Result<Arc<S>> + Send + Sync + 'static,
    ) -> Self {
        self.add_with(Lifetime::Singleton, parameters, factory)
    }

    /// Factory called once per provider.
    pub fn scoped_with<S: ?Sized + Send + Sync + 'static>(
        self,
        parameters: impl IntoIterator<Item = Parameter>,
        factory: impl Fn(&Arguments) -> Result<Arc<S>> + Send + Sync + 'static,
    ) -> Self {
        self.add_with(Lifetime::Scoped, parameters, factory)
    }

    /// Factory called on every request.
    pub fn transient_with<S: ?Sized + Send + Sync + 'static>(
        self,
        parameters: impl IntoIterator<Item = Parameter>,
        factory: impl Fn(&Arguments) -> Result<Arc<S>> + Send + Sync + 'static,
    ) -> Self {
        self.add_with(Lifetime::Transient, parameters, factory)
    }

    /// Registers a factory whose products are released when the owning
    /// provider closes.
    pub fn add_disposable_with<T: Disposable + Send + Sync + 'static>(
        self,
        lifetime: Lifetime,
        parameters: impl IntoIterator<Item = Parameter>,
        factory: impl Fn(&Arguments) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        let descriptor = Descriptor::construct(
            ServiceKey::of::<T>(),
            lifetime,
            parameters,
            &self.bindings,
            disposable_constructor::<T, _>(factory),
        );
        self.record(descriptor)
    }

    // ── Instances ──

    /// Registers a pre-built value, handed out as-is.
    pub fn instance<S: ?Sized + Send + Sync + 'static>(self, value: Arc<S>) -> Self {
        self.instance_any(ServiceKey::of::<S>(), Arc::new(value))
    }

    /// Registers a type-erased pre-built value for `service`.
    ///
    /// The value must be stored as `Arc<T>` for the service type `T`.
    pub fn instance_any(self, service: ServiceKey, value: Instance) -> Self {
        let descriptor = Descriptor::instance(service, value);
        self.record(descriptor)
    }

    // ── Aliases and bindings ──

    /// Makes requests for `A` resolve to the registrations of `C`.
    ///
    /// ```rust,ignore
    /// builder
    ///     .singleton::<SmtpMailer>()
    ///     .map::<dyn Mailer, SmtpMailer>();
    /// ```
    pub fn map<A, C>(mut self) -> Self
    where
        A: ?Sized + Send + Sync + 'static,
        C: Upcast<A> + Send + Sync + 'static,
    {
        let alias = ServiceKey::of::<A>();
        debug!(alias = %alias, target = %ServiceKey::of::<C>(), "Registered alias");
        self.aliases.insert(alias, Alias::new::<A, C>());
        self
    }

    /// Binds the undeclared parameter `name` to service `T` for every
    /// registration made after this call.
    pub fn bind<T: ?Sized + Send + Sync + 'static>(self, name: &'static str) -> Self {
        self.bind_key(name, ServiceKey::of::<T>())
    }

    pub fn bind_key(mut self, name: &'static str, key: ServiceKey) -> Self {
        debug!(parameter = name, service = %key, "Bound parameter name");
        self.bindings.insert(name, key);
        self
    }

    // ── Configuration ──

    /// Guards the root provider's caches with a [`ReentrantLock`].
    pub fn thread_safe(self) -> Self {
        self.singleton_with::<dyn Lock>([], |_| Ok(Arc::new(ReentrantLock::new()) as Arc<dyn Lock>))
    }

    /// Adds a [`Module`]'s registrations.
    pub fn add_module(self, module: &dyn Module) -> Self {
        debug!(module = module.name(), "Adding module");
        module.register(self)
    }

    // ── Build ──

    /// Checks the dependency graph without constructing anything.
    ///
    /// Checks: all dependencies registered, no cycles, no singleton
    /// consuming a shorter-lived service.
    pub fn validate(&self) -> Result<()> {
        let registry = self.compile()?;
        GraphValidator::new(&registry).validate()
    }

    /// Compiles the registrations and returns a new root provider.
    ///
    /// Each call yields an independent root with empty caches.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(&self) -> Result<Provider> {
        info!(registered = self.descriptors.len(), aliases = self.aliases.len(), "Building container");

        let registry = Arc::new(self.compile()?);
        let provider = Provider::create_root(registry)?;

        info!("Container built successfully");
        Ok(provider)
    }

    // ── Internal ──

    fn compile(&self) -> Result<Registry> {
        if let Some(err) = self.errors.first() {
            return Err(err.clone().into());
        }

        let scope_factory = Descriptor::construct(
            ServiceKey::of::<ScopeFactory>(),
            Lifetime::Transient,
            ScopeFactory::parameters(),
            &self.bindings,
            injectable_constructor::<ScopeFactory, ScopeFactory>(),
        )?;

        let descriptors = self
            .descriptors
            .iter()
            .cloned()
            .chain([scope_factory, Descriptor::provider_handle()]);
        Ok(Registry::compile(descriptors, self.aliases.clone()))
    }

    fn record(mut self, descriptor: std::result::Result<Descriptor, ConfigurationError>) -> Self {
        match descriptor {
            Ok(descriptor) => self.add(descriptor),
            Err(err) => {
                debug!(error = %err, "Rejected registration");
                self.errors.push(err);
                self
            }
        }
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("registered", &self.descriptors.len())
            .field("aliases", &self.aliases.len())
            .field("bindings", &self.bindings.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

/// Convenient imports.
pub mod prelude {
    pub use super::ContainerBuilder;
    pub use crate::descriptor::{Arguments, Injectable, Parameter, Upcast};
    pub use crate::dispose::{Disposable, Outcome};
    pub use crate::error::{Result, WakilError};
    pub use crate::key::{Instance, ServiceKey};
    pub use crate::lifetime::Lifetime;
    pub use crate::lock::Lock;
    pub use crate::module::Module;
    pub use crate::provider::Provider;
    pub use crate::scope::ScopeFactory;
    pub use crate::validator::Validator;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WakilError;

    struct Config {
        port: u16,
    }

    struct Server {
        config: Arc<Config>,
    }

    impl Injectable for Server {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::named("config")]
        }

        fn construct(args: &Arguments) -> Result<Self> {
            Ok(Server { config: args.get("config")? })
        }
    }

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    struct Triangle;

    impl Shape for Triangle {
        fn sides(&self) -> u32 {
            3
        }
    }

    impl Injectable for Triangle {
        fn parameters() -> Vec<Parameter> {
            Vec::new()
        }

        fn construct(_: &Arguments) -> Result<Self> {
            Ok(Triangle)
        }
    }

    crate::upcast!(Triangle => dyn Shape);

    #[test]
    fn bind_resolves_undeclared_parameter() {
        let provider = ContainerBuilder::new()
            .instance(Arc::new(Config { port: 8080 }))
            .bind::<Config>("config")
            .singleton::<Server>()
            .build()
            .unwrap();

        assert_eq!(provider.require::<Server>().unwrap().config.port, 8080);
    }

    #[test]
    fn unbound_parameter_surfaces_at_build() {
        let builder = ContainerBuilder::new().singleton::<Server>();

        match builder.build() {
            Err(WakilError::Configuration(ConfigurationError::UnresolvableParameter { parameter, .. })) => {
                assert_eq!(parameter, "config");
            }
            other => panic!("Expected UnresolvableParameter, got: {other:?}"),
        }
    }

    #[test]
    fn mistyped_instance_surfaces_at_build() {
        let wrong: Instance = Arc::new(Arc::new(1u8));
        let builder = ContainerBuilder::new().instance_any(ServiceKey::of::<Config>(), wrong);
        assert!(matches!(
            builder.build(),
            Err(WakilError::Configuration(ConfigurationError::InstanceTypeMismatch { .. }))
        ));
    }

    #[test]
    fn build_twice_gives_independent_roots() {
        let builder = ContainerBuilder::new().singleton_with::<Config>([], |_| Ok(Arc::new(Config { port: 1 })));

        let first = builder.build().unwrap();
        let second = builder.build().unwrap();
        assert!(!first.same_scope(&second));
        assert!(!Arc::ptr_eq(
            &first.require::<Config>().unwrap(),
            &second.require::<Config>().unwrap()
        ));
    }

    #[test]
    fn register_trait_object_implementation() {
        let provider = ContainerBuilder::new().scoped_as::<dyn Shape, Triangle>().build().unwrap();

        assert_eq!(provider.require::<dyn Shape>().unwrap().sides(), 3);
        assert!(provider.get::<Triangle>().unwrap().is_none());
    }

    #[test]
    fn map_aliases_registered_concrete() {
        let provider = ContainerBuilder::new()
            .singleton::<Triangle>()
            .map::<dyn Shape, Triangle>()
            .build()
            .unwrap();

        let shape = provider.require::<dyn Shape>().unwrap();
        let triangle = provider.require::<Triangle>().unwrap();
        assert_eq!(Arc::as_ptr(&shape) as *const (), Arc::as_ptr(&triangle) as *const ());
    }

    #[test]
    fn thread_safe_installs_reentrant_lock() {
        let provider = ContainerBuilder::new().thread_safe().build().unwrap();
        let lock = provider.require::<dyn Lock>().unwrap();

        let outer = lock.acquire();
        let inner = lock.acquire();
        assert!(outer.is_held());
        assert!(inner.is_held());
    }

    #[test]
    fn validate_reports_missing_dependency() {
        let builder = ContainerBuilder::new()
            .transient_with::<Server>([Parameter::of::<Config>("config")], |args| {
                Ok(Arc::new(Server { config: args.get("config")? }))
            });

        assert!(matches!(builder.validate(), Err(WakilError::NotRegistered(_))));
        assert!(builder.build().is_ok());
    }

    #[test]
    fn default_registrations_validate() {
        assert!(ContainerBuilder::default().validate().is_ok());
    }

    #[test]
    fn debug_display() {
        let debug = format!("{:?}", ContainerBuilder::new().bind::<Config>("config"));
        assert!(debug.contains("ContainerBuilder"));
        assert!(debug.contains("bindings: 1"));
    }
}
