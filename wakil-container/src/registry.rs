//! Registration map: the compiled, read-only lookup table.
//!
//! Built once per [`ContainerBuilder::build`](crate::builder::ContainerBuilder::build)
//! from the ordered descriptor list and shared by every provider derived
//! from that build.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::descriptor::{Descriptor, Upcast};
use crate::error::{Result, ValidationError, WakilError};
use crate::key::{Instance, ServiceKey, downcast};

/// Converts an instance of an alias target into an instance of the alias.
pub type Converter = Arc<dyn Fn(Instance) -> Result<Instance> + Send + Sync>;

/// Redirects lookups of one service key to another key's registrations.
#[derive(Clone)]
pub struct Alias {
    target: ServiceKey,
    convert: Converter,
}

impl Alias {
    /// Alias `A` resolving to the registrations of `C`.
    pub fn new<A, C>() -> Self
    where
        A: ?Sized + Send + Sync + 'static,
        C: Upcast<A> + Send + Sync + 'static,
    {
        let target = ServiceKey::of::<C>();
        let alias = ServiceKey::of::<A>();
        Self {
            target,
            convert: Arc::new(move |instance: Instance| {
                let concrete = downcast::<C>(&instance).ok_or_else(|| {
                    WakilError::Validation(ValidationError {
                        expected: target,
                        detail: format!("alias {alias} received a foreign instance"),
                    })
                })?;
                let service: Arc<A> = <C as Upcast<A>>::upcast(concrete);
                Ok(Arc::new(service) as Instance)
            }),
        }
    }

    pub fn target(&self) -> ServiceKey {
        self.target
    }
}

impl std::fmt::Debug for Alias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alias").field("target", &self.target).finish()
    }
}

/// Where a request for some key is actually served from.
pub struct Route<'a> {
    /// The key whose registrations and cache entry serve the request.
    pub key: ServiceKey,
    convert: Option<&'a Converter>,
}

impl Route<'_> {
    /// Converts an instance of [`Route::key`] into the requested type.
    pub fn apply(&self, instance: Instance) -> Result<Instance> {
        match self.convert {
            Some(convert) => convert(instance),
            None => Ok(instance),
        }
    }

    pub fn is_alias(&self) -> bool {
        self.convert.is_some()
    }
}

/// Service key to ordered descriptor list, plus aliases.
#[derive(Debug, Default)]
pub struct Registry {
    descriptors: HashMap<ServiceKey, Vec<Descriptor>>,
    aliases: HashMap<ServiceKey, Alias>,
    count: usize,
}

impl Registry {
    /// Compiles descriptors, keeping registration order per service key.
    pub fn compile(
        descriptors: impl IntoIterator<Item = Descriptor>,
        aliases: HashMap<ServiceKey, Alias>,
    ) -> Self {
        let mut table: HashMap<ServiceKey, Vec<Descriptor>> = HashMap::new();
        let mut count = 0;
        for descriptor in descriptors {
            trace!(service = %descriptor.service(), lifetime = %descriptor.lifetime(), "Compiling descriptor");
            table.entry(descriptor.service()).or_default().push(descriptor);
            count += 1;
        }

        debug!(services = table.len(), descriptors = count, aliases = aliases.len(), "Compiled registry");
        Self { descriptors: table, aliases, count }
    }

    /// Follows the alias of `key`, if any.
    pub fn route(&self, key: &ServiceKey) -> Route<'_> {
        match self.aliases.get(key) {
            Some(alias) => {
                trace!(from = %key, to = %alias.target, "Following alias");
                Route { key: alias.target, convert: Some(&alias.convert) }
            }
            None => Route { key: *key, convert: None },
        }
    }

    /// The last descriptor registered for `key` (aliases followed).
    pub fn lookup_one(&self, key: &ServiceKey) -> Option<&Descriptor> {
        self.last_registered(&self.route(key).key)
    }

    /// The descriptor that serves single-service requests for an already
    /// routed `key`: the last one registered under it.
    pub fn last_registered(&self, key: &ServiceKey) -> Option<&Descriptor> {
        self.registered(key).and_then(<[Descriptor]>::last)
    }

    /// Every descriptor registered for `key`, in registration order
    /// (aliases followed).
    pub fn lookup_all(&self, key: &ServiceKey) -> Option<&[Descriptor]> {
        self.registered(&self.route(key).key)
    }

    /// Descriptors registered directly under `key`, without alias lookup.
    pub(crate) fn registered(&self, key: &ServiceKey) -> Option<&[Descriptor]> {
        self.descriptors.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.lookup_all(key).is_some()
    }

    /// Every service key that can be requested: registered keys and aliases.
    pub fn registered_keys(&self) -> Vec<ServiceKey> {
        let mut keys: Vec<_> = self.descriptors.keys().copied().collect();
        keys.extend(self.aliases.keys().copied());
        keys.sort_by_key(|key| key.type_name());
        keys
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
