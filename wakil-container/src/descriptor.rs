//! Registration records.
//!
//! A [`Descriptor`] binds a service type to a lifetime and a way of
//! producing instances. Parameters are bound to service keys once, when the
//! descriptor is created; resolution only walks the fixed parameter table.
//!
//! # Constructible types
//! ```rust
//! use std::sync::Arc;
//! use wakil_container::descriptor::{Arguments, Injectable, Parameter};
//! use wakil_container::error::Result;
//!
//! struct Settings;
//!
//! struct Mailer {
//!     settings: Arc<Settings>,
//! }
//!
//! impl Injectable for Mailer {
//!     fn parameters() -> Vec<Parameter> {
//!         vec![Parameter::of::<Settings>("settings")]
//!     }
//!
//!     fn construct(args: &Arguments) -> Result<Self> {
//!         Ok(Mailer { settings: args.get("settings")? })
//!     }
//! }
//! ```

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cycle::CycleChecker;
use crate::dispose::Disposable;
use crate::error::{ConfigurationError, Result, WakilError};
use crate::key::{Instance, ServiceKey, downcast};
use crate::lifetime::Lifetime;
use crate::provider::Provider;

/// Parameter-name to service-key table used for undeclared parameters.
pub type NameBindings = HashMap<&'static str, ServiceKey>;

/// Produces an instance from resolved arguments.
///
/// Shared between every provider built from the same registrations, hence
/// `Arc` and `Send + Sync`.
pub type Constructor = Arc<dyn Fn(&Arguments) -> Result<Constructed> + Send + Sync>;

/// A freshly constructed instance and, if it takes part in disposal,
/// its [`Disposable`] handle.
pub struct Constructed {
    pub instance: Instance,
    pub disposer: Option<Arc<dyn Disposable>>,
}

impl Constructed {
    /// Wraps `value` for service type `T`.
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self { instance: Arc::new(value), disposer: None }
    }

    /// Wraps `value` and releases it through its own [`Disposable`] impl.
    pub fn disposable<T: Disposable + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self { instance: Arc::new(value.clone()), disposer: Some(value) }
    }
}

/// A constructor parameter as declared by a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    name: &'static str,
    key: Option<ServiceKey>,
}

impl Parameter {
    /// A parameter receiving `Arc<T>`.
    pub fn of<T: ?Sized + Send + Sync + 'static>(name: &'static str) -> Self {
        Self::with_key(name, ServiceKey::of::<T>())
    }

    /// A parameter receiving every registration of `T`, in order.
    pub fn list_of<T: ?Sized + Send + Sync + 'static>(name: &'static str) -> Self {
        Self::with_key(name, ServiceKey::list_of::<T>())
    }

    /// A parameter receiving the provider that performs the resolution.
    pub fn provider(name: &'static str) -> Self {
        Self::of::<Provider>(name)
    }

    /// A parameter with no declared type.
    ///
    /// Its type comes from the builder's name bindings when the descriptor
    /// is registered.
    pub fn named(name: &'static str) -> Self {
        Self { name, key: None }
    }

    /// A parameter receiving whatever `key` resolves to.
    ///
    /// For registrations assembled from type-erased keys, e.g. alongside
    /// [`ContainerBuilder::instance_any`](crate::builder::ContainerBuilder::instance_any).
    pub fn with_key(name: &'static str, key: ServiceKey) -> Self {
        Self { name, key: Some(key) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> Option<ServiceKey> {
        self.key
    }
}

/// A parameter whose service key is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundParameter {
    pub name: &'static str,
    pub key: ServiceKey,
}

/// How a descriptor produces its instance.
#[derive(Clone)]
pub enum Factory {
    /// Resolve the parameters, then call the constructor.
    Construct {
        parameters: Arc<[BoundParameter]>,
        constructor: Constructor,
    },
    /// Hand out a pre-built value.
    Instance(Instance),
    /// Hand out the requesting provider itself.
    Provider,
}

/// Immutable registration record: service type, lifetime, factory.
#[derive(Clone)]
pub struct Descriptor {
    service: ServiceKey,
    lifetime: Lifetime,
    factory: Factory,
}

impl Descriptor {
    /// Creates a descriptor that resolves `parameters` and calls `constructor`.
    ///
    /// Every parameter is bound here: its declared key, or else the key
    /// bound to its name in `bindings`.
    ///
    /// # Errors
    /// - [`ConfigurationError::UnresolvableParameter`]: a parameter has neither
    /// - [`ConfigurationError::InvalidLifetime`]: `Lifetime::Instance` needs a value
    pub fn construct(
        service: ServiceKey,
        lifetime: Lifetime,
        parameters: impl IntoIterator<Item = Parameter>,
        bindings: &NameBindings,
        constructor: Constructor,
    ) -> std::result::Result<Self, ConfigurationError> {
        if lifetime == Lifetime::Instance {
            return Err(ConfigurationError::InvalidLifetime {
                service,
                lifetime,
                reason: "instance registrations take a pre-built value",
            });
        }

        let parameters = parameters
            .into_iter()
            .map(|parameter| {
                let key = parameter
                    .key
                    .or_else(|| bindings.get(parameter.name).copied())
                    .ok_or(ConfigurationError::UnresolvableParameter {
                        service,
                        parameter: parameter.name,
                    })?;
                Ok(BoundParameter { name: parameter.name, key })
            })
            .collect::<std::result::Result<Arc<[BoundParameter]>, ConfigurationError>>()?;

        Ok(Self {
            service,
            lifetime,
            factory: Factory::Construct { parameters, constructor },
        })
    }

    /// Creates an [`Lifetime::Instance`] descriptor for a pre-built value.
    ///
    /// # Errors
    /// [`ConfigurationError::InstanceTypeMismatch`] if `value` is not stored
    /// as `Arc<T>` for the service type `T`.
    pub fn instance(
        service: ServiceKey,
        value: Instance,
    ) -> std::result::Result<Self, ConfigurationError> {
        if service.is_list() || !service.accepts(&value) {
            return Err(ConfigurationError::InstanceTypeMismatch { service });
        }

        Ok(Self {
            service,
            lifetime: Lifetime::Instance,
            factory: Factory::Instance(value),
        })
    }

    /// The built-in registration that resolves [`Provider`] to the
    /// requesting provider.
    pub fn provider_handle() -> Self {
        Self {
            service: ServiceKey::of::<Provider>(),
            lifetime: Lifetime::Scoped,
            factory: Factory::Provider,
        }
    }

    pub fn service(&self) -> ServiceKey {
        self.service
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Bound parameters; empty for instances and the provider handle.
    pub fn parameters(&self) -> &[BoundParameter] {
        match &self.factory {
            Factory::Construct { parameters, .. } => parameters,
            Factory::Instance(_) | Factory::Provider => &[],
        }
    }

    pub fn is_provider_handle(&self) -> bool {
        matches!(self.factory, Factory::Provider)
    }

    /// Produces an instance, resolving parameters through `provider`
    /// within the cycle context `checker`.
    pub fn instantiate(&self, provider: &Provider, checker: &mut CycleChecker) -> Result<Constructed> {
        match &self.factory {
            Factory::Instance(value) => Ok(Constructed { instance: value.clone(), disposer: None }),
            Factory::Provider => Ok(Constructed::new(Arc::new(provider.clone()))),
            Factory::Construct { parameters, constructor } => {
                let mut values = Vec::with_capacity(parameters.len());
                for parameter in parameters.iter() {
                    let value = provider.resolve_dependency(&parameter.key, checker)?;
                    values.push((parameter.name, value));
                }

                constructor(&Arguments { service: self.service, values })
            }
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.factory {
            Factory::Construct { .. } => "construct",
            Factory::Instance(_) => "instance",
            Factory::Provider => "provider",
        };
        f.debug_struct("Descriptor")
            .field("service", &self.service)
            .field("lifetime", &self.lifetime)
            .field("factory", &kind)
            .field("parameters", &self.parameters())
            .finish()
    }
}

/// A resolved parameter value.
#[derive(Clone)]
pub enum Argument {
    One(Instance),
    Many(Vec<Instance>),
}

/// Resolved parameters handed to a constructor, looked up by name.
pub struct Arguments {
    service: ServiceKey,
    values: Vec<(&'static str, Argument)>,
}

impl Arguments {
    /// Builds arguments by hand, e.g. to call a constructor in a test.
    pub fn new(service: ServiceKey, values: Vec<(&'static str, Argument)>) -> Self {
        Self { service, values }
    }

    /// The service being constructed.
    pub fn service(&self) -> ServiceKey {
        self.service
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes the parameter `name` as `Arc<T>`.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        match self.find(name)? {
            Argument::One(instance) => downcast::<T>(instance).ok_or_else(|| self.mismatch::<Arc<T>>(name)),
            Argument::Many(_) => Err(self.mismatch::<Arc<T>>(name)),
        }
    }

    /// Takes the list parameter `name` as `Vec<Arc<T>>`.
    pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Vec<Arc<T>>> {
        match self.find(name)? {
            Argument::Many(items) => items
                .iter()
                .map(|instance| downcast::<T>(instance).ok_or_else(|| self.mismatch::<Vec<Arc<T>>>(name)))
                .collect(),
            Argument::One(_) => Err(self.mismatch::<Vec<Arc<T>>>(name)),
        }
    }

    /// Takes the parameter `name` as a [`Provider`] handle.
    pub fn provider(&self, name: &str) -> Result<Provider> {
        self.get::<Provider>(name).map(|provider| (*provider).clone())
    }

    fn find(&self, name: &str) -> Result<&Argument> {
        self.values
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, value)| value)
            .ok_or_else(|| WakilError::construction(self.service, format!("no parameter named `{name}`")))
    }

    fn mismatch<E: ?Sized>(&self, name: &str) -> WakilError {
        WakilError::construction(
            self.service,
            format!("parameter `{name}` is not a {}", type_name::<E>()),
        )
    }
}

/// A type the container can construct.
///
/// Usually derived with `#[derive(Injectable)]`; implement it by hand for
/// types that need custom wiring.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// The constructor's parameters, in order.
    fn parameters() -> Vec<Parameter>;

    /// Builds the value from resolved arguments.
    fn construct(args: &Arguments) -> Result<Self>;

    /// The handle used to release this instance when its scope closes.
    fn disposer(_this: &Arc<Self>) -> Option<Arc<dyn Disposable>> {
        None
    }
}

/// Converts an `Arc` of an implementation into an `Arc` of the service it
/// is registered as.
///
/// Every type converts to itself. Use [`upcast!`](crate::upcast) to let a
/// type stand in for trait objects.
pub trait Upcast<S: ?Sized> {
    fn upcast(self: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> Upcast<T> for T {
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Implements [`Upcast`] from a concrete type to trait objects.
///
/// ```rust
/// trait Greeter: Send + Sync {}
/// trait Named: Send + Sync {}
///
/// struct English;
/// impl Greeter for English {}
/// impl Named for English {}
///
/// wakil_container::upcast!(English => dyn Greeter, dyn Named);
/// ```
#[macro_export]
macro_rules! upcast {
    ($implementation:ty => $($service:ty),+ $(,)?) => {
        $(
            impl $crate::descriptor::Upcast<$service> for $implementation {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    self
                }
            }
        )+
    };
}

/// Constructor for implementation `I` registered as service `S`.
pub fn injectable_constructor<S, I>() -> Constructor
where
    S: ?Sized + Send + Sync + 'static,
    I: Injectable + Upcast<S>,
{
    Arc::new(|args: &Arguments| {
        let value = Arc::new(I::construct(args)?);
        let disposer = I::disposer(&value);
        let service: Arc<S> = <I as Upcast<S>>::upcast(value);
        Ok(Constructed { instance: Arc::new(service), disposer })
    })
}

/// Constructor wrapping a factory closure for service `S`.
pub fn factory_constructor<S, R, F>(factory: F) -> Constructor
where
    S: ?Sized + Send + Sync + 'static,
    R: Into<Arc<S>>,
    F: Fn(&Arguments) -> Result<R> + Send + Sync + 'static,
{
    Arc::new(move |args: &Arguments| Ok(Constructed::new::<S>(factory(args)?.into())))
}

/// Constructor wrapping a factory closure whose product is [`Disposable`].
pub fn disposable_constructor<T, F>(factory: F) -> Constructor
where
    T: Disposable + Send + Sync + 'static,
    F: Fn(&Arguments) -> Result<T> + Send + Sync + 'static,
{
    Arc::new(move |args: &Arguments| Ok(Constructed::disposable(Arc::new(factory(args)?))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Settings {
        port: u16,
    }

    struct Server {
        settings: Arc<Settings>,
    }

    impl Injectable for Server {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::named("settings")]
        }

        fn construct(args: &Arguments) -> Result<Self> {
            Ok(Server { settings: args.get("settings")? })
        }
    }

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    crate::upcast!(English => dyn Greeter);

    impl Injectable for English {
        fn parameters() -> Vec<Parameter> {
            Vec::new()
        }

        fn construct(_: &Arguments) -> Result<Self> {
            Ok(English)
        }
    }

    fn settings_argument(port: u16) -> Argument {
        Argument::One(Arc::new(Arc::new(Settings { port })))
    }

    #[test]
    fn named_parameter_binds_through_table() {
        let mut bindings = NameBindings::new();
        bindings.insert("settings", ServiceKey::of::<Settings>());

        let descriptor = Descriptor::construct(
            ServiceKey::of::<Server>(),
            Lifetime::Scoped,
            Server::parameters(),
            &bindings,
            injectable_constructor::<Server, Server>(),
        )
        .unwrap();

        assert_eq!(
            descriptor.parameters(),
            &[BoundParameter { name: "settings", key: ServiceKey::of::<Settings>() }]
        );
    }

    #[test]
    fn unbound_parameter_is_configuration_error() {
        let result = Descriptor::construct(
            ServiceKey::of::<Server>(),
            Lifetime::Scoped,
            Server::parameters(),
            &NameBindings::new(),
            injectable_constructor::<Server, Server>(),
        );

        match result {
            Err(ConfigurationError::UnresolvableParameter { parameter, service }) => {
                assert_eq!(parameter, "settings");
                assert_eq!(service, ServiceKey::of::<Server>());
            }
            other => panic!("Expected UnresolvableParameter, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn instance_lifetime_needs_a_value() {
        let result = Descriptor::construct(
            ServiceKey::of::<English>(),
            Lifetime::Instance,
            Vec::new(),
            &NameBindings::new(),
            injectable_constructor::<English, English>(),
        );
        assert!(matches!(result, Err(ConfigurationError::InvalidLifetime { .. })));
    }

    #[test]
    fn instance_descriptor_checks_type() {
        let good: Instance = Arc::new(Arc::new(7u8));
        let descriptor = Descriptor::instance(ServiceKey::of::<u8>(), good).unwrap();
        assert_eq!(descriptor.lifetime(), Lifetime::Instance);
        assert!(descriptor.parameters().is_empty());

        let wrong: Instance = Arc::new(Arc::new(7u16));
        assert!(matches!(
            Descriptor::instance(ServiceKey::of::<u8>(), wrong),
            Err(ConfigurationError::InstanceTypeMismatch { .. })
        ));
    }

    #[test]
    fn constructor_reads_arguments_by_name() {
        let constructor = injectable_constructor::<Server, Server>();
        let args = Arguments::new(
            ServiceKey::of::<Server>(),
            vec![("settings", settings_argument(8080))],
        );

        let built = constructor(&args).unwrap();
        assert!(built.disposer.is_none());
        let server = downcast::<Server>(&built.instance).unwrap();
        assert_eq!(server.settings.port, 8080);
    }

    #[test]
    fn missing_or_mistyped_argument_fails_construction() {
        let args = Arguments::new(ServiceKey::of::<Server>(), vec![("settings", settings_argument(1))]);

        assert!(matches!(
            args.get::<Settings>("other"),
            Err(WakilError::ConstructionFailed { .. })
        ));
        assert!(matches!(args.get::<u32>("settings"), Err(WakilError::ConstructionFailed { .. })));
        assert!(matches!(
            args.get_all::<Settings>("settings"),
            Err(WakilError::ConstructionFailed { .. })
        ));
    }

    #[test]
    fn upcast_registers_trait_object() {
        let constructor = injectable_constructor::<dyn Greeter, English>();
        let built = constructor(&Arguments::new(ServiceKey::of::<dyn Greeter>(), Vec::new())).unwrap();

        assert!(ServiceKey::of::<dyn Greeter>().accepts(&built.instance));
        let greeter = downcast::<dyn Greeter>(&built.instance).unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn factory_constructor_accepts_values_and_arcs() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = factory_constructor::<u32, _, _>({
            let calls = calls.clone();
            move |_| Ok(calls.fetch_add(1, Ordering::SeqCst))
        });
        let boxed = factory_constructor::<dyn Greeter, _, _>(|_| Ok(Arc::new(English) as Arc<dyn Greeter>));

        let args = Arguments::new(ServiceKey::of::<u32>(), Vec::new());
        counted(&args).unwrap();
        counted(&args).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let built = boxed(&args).unwrap();
        assert!(ServiceKey::of::<dyn Greeter>().accepts(&built.instance));
    }
}
