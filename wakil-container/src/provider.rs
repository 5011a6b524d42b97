//! # The Provider: resolution engine and scope
//!
//! A [`Provider`] is a live resolution context. Exactly one provider per
//! build is the root; every other provider is a child scope created from
//! some ancestor.
//!
//! ```text
//! ContainerBuilder ──build()──> root Provider ── singletons, root-scoped
//!                                   │
//!                                scope()
//!                                   ▼
//!                             child Provider ── its own scoped cache
//!                                   │            and disposal stack
//!                                scope()
//!                                   ▼
//!                             child Provider
//! ```
//!
//! | Lifetime    | Created against | Cached by          |
//! |-------------|-----------------|--------------------|
//! | `Singleton` | root            | root               |
//! | `Scoped`    | requesting      | requesting         |
//! | `Instance`  | requesting      | requesting         |
//! | `Transient` | requesting      | never              |
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use wakil_container::prelude::*;
//!
//! struct Session(u32);
//!
//! let root = Provider::builder()
//!     .scoped_with::<Session>([], |_| Ok(Arc::new(Session(7))))
//!     .build()
//!     .unwrap();
//!
//! let scope = root.scope().unwrap();
//! let a = scope.require::<Session>().unwrap();
//! let b = scope.require::<Session>().unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! assert!(!Arc::ptr_eq(&a, &root.require::<Session>().unwrap()));
//! scope.close();
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::{debug, trace};
use wakil_support::rendering::suggest_similar;

use crate::builder::ContainerBuilder;
use crate::cycle::CycleChecker;
use crate::descriptor::{Argument, Constructed, Descriptor};
use crate::dispose::{Disposable, DisposeStack, Outcome};
use crate::error::{NotRegisteredError, Result, ValidationError, WakilError};
use crate::key::{Instance, ServiceKey, downcast};
use crate::lock::{Lock, NoopLock};
use crate::registry::Registry;
use crate::scope::ScopeFactory;
use crate::validator::Validator;

static UNGUARDED: NoopLock = NoopLock;

/// Slots of a "list of T" request: the shared instance for cached
/// lifetimes, `None` where a transient is created per request.
type ListSlots = Arc<[Option<Instance>]>;

/// Handle to a resolution scope. Cloning the handle does not create a scope.
#[derive(Clone)]
pub struct Provider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    registry: Arc<Registry>,
    /// `None` on the root itself.
    root: Option<Provider>,
    depth: usize,
    lock: OnceCell<Arc<dyn Lock>>,
    cache: DashMap<ServiceKey, Instance>,
    lists: DashMap<ServiceKey, ListSlots>,
    /// Singleton entries of lists that are not the last registration.
    elements: DashMap<(ServiceKey, usize), Instance>,
    disposables: DisposeStack,
    closed: AtomicBool,
}

impl Provider {
    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Creates the root provider and installs the registered `dyn Lock`.
    pub(crate) fn create_root(registry: Arc<Registry>) -> Result<Self> {
        let provider = Self::with_parent(registry, None, 0);
        let lock = provider.require::<dyn Lock>()?;
        // The cell is fresh, so this cannot already be set.
        let _ = provider.inner.lock.set(lock);
        Ok(provider)
    }

    /// Creates a child scope sharing the registry and the root.
    pub(crate) fn child(&self) -> Self {
        Self::with_parent(
            self.inner.registry.clone(),
            Some(self.root()),
            self.inner.depth + 1,
        )
    }

    fn with_parent(registry: Arc<Registry>, root: Option<Provider>, depth: usize) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                registry,
                root,
                depth,
                lock: OnceCell::new(),
                cache: DashMap::new(),
                lists: DashMap::new(),
                elements: DashMap::new(),
                disposables: DisposeStack::default(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    // ── Typed API ──

    /// Resolves `T`, or `Ok(None)` if `T` has no registration at all.
    ///
    /// A missing *dependency* of `T` is still an error.
    ///
    /// ```rust,ignore
    /// let cache: Option<Arc<Cache>> = provider.get()?;
    /// ```
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        let key = ServiceKey::of::<T>();
        self.get_key(&key)?
            .map(|instance| typed::<T>(&key, &instance))
            .transpose()
    }

    /// Resolves `T`, failing with [`WakilError::NotRegistered`] if absent.
    pub fn require<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get::<T>()?
            .ok_or_else(|| self.not_registered(ServiceKey::of::<T>(), None))
    }

    /// Resolves every registration of `T`, in registration order.
    ///
    /// Unregistered `T` yields an empty list.
    pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        let key = ServiceKey::of::<T>();
        self.get_all_key(&key)?
            .iter()
            .map(|instance| typed::<T>(&key, instance))
            .collect()
    }

    // ── Type-erased API ──

    /// Resolves a plain key; `Ok(None)` if it has no registration.
    ///
    /// List keys resolve through [`Provider::get_all_key`].
    pub fn get_key(&self, key: &ServiceKey) -> Result<Option<Instance>> {
        if key.is_list() {
            return Err(WakilError::Validation(ValidationError {
                expected: *key,
                detail: "list keys resolve through get_all_key".into(),
            }));
        }

        self.ensure_open(key)?;
        let registry = &self.inner.registry;
        let route = registry.route(key);
        if registry.registered(&route.key).is_none() {
            trace!(key = %key, "No registration, resolving to none");
            return Ok(None);
        }

        let mut checker = CycleChecker::new();
        let instance = self.resolve_target(route.key, &mut checker)?;
        route.apply(instance).map(Some)
    }

    /// Resolves every registration of the element type of `key`.
    pub fn get_all_key(&self, key: &ServiceKey) -> Result<Vec<Instance>> {
        let element = key.element();
        self.ensure_open(&element)?;
        self.resolve_list(element, None)
    }

    // ── Scopes ──

    /// Creates a child scope through the registered [`ScopeFactory`].
    pub fn scope(&self) -> Result<Provider> {
        let factory = self.require::<ScopeFactory>()?;
        Ok(factory.create_scope())
    }

    /// Runs `work` in a new child scope, then closes the scope with the
    /// outcome of `work`.
    pub fn with_scope<R, E>(&self, work: impl FnOnce(&Provider) -> std::result::Result<R, E>) -> std::result::Result<R, E>
    where
        E: From<WakilError> + std::error::Error + 'static,
    {
        let scope = self.scope()?;
        let result = work(&scope);
        match &result {
            Ok(_) => scope.close(),
            Err(err) => scope.close_with(&Outcome::Failed(err)),
        }
        result
    }

    /// Releases every acquired disposable and clears the caches.
    ///
    /// Closing twice is a no-op. Open child scopes are not closed.
    pub fn close(&self) {
        self.close_with(&Outcome::Completed);
    }

    /// Like [`Provider::close`], passing `outcome` to every disposable.
    pub fn close_with(&self, outcome: &Outcome<'_>) {
        // Waits for constructions in flight on a thread-safe root.
        let _guard = self.lock().acquire();
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            trace!(depth = self.inner.depth, "Provider already closed");
            return;
        }

        let released = self.inner.disposables.release_all(outcome);
        self.inner.cache.clear();
        self.inner.lists.clear();
        self.inner.elements.clear();
        debug!(depth = self.inner.depth, released, failed = outcome.is_failure(), "Closed provider");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn is_root(&self) -> bool {
        self.inner.root.is_none()
    }

    /// The root provider of this scope tree.
    pub fn root(&self) -> Provider {
        self.inner.root.clone().unwrap_or_else(|| self.clone())
    }

    /// Nesting depth: 0 for the root.
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Returns `true` if both handles refer to the same scope.
    pub fn same_scope(&self, other: &Provider) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The registration map this provider resolves from.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    // ── Resolution engine ──

    /// Resolves a constructor parameter within an ongoing resolution.
    pub(crate) fn resolve_dependency(&self, key: &ServiceKey, checker: &mut CycleChecker) -> Result<Argument> {
        self.ensure_open(key)?;
        if key.is_list() {
            return self.resolve_list(key.element(), Some(checker)).map(Argument::Many);
        }

        let route = self.inner.registry.route(key);
        let instance = self.resolve_target(route.key, checker)?;
        route.apply(instance).map(Argument::One)
    }

    /// Single-service resolution of a canonical (alias-free) key.
    fn resolve_target(&self, key: ServiceKey, checker: &mut CycleChecker) -> Result<Instance> {
        let _guard = self.lock().acquire();

        if let Some(hit) = self.cached(&key) {
            trace!(key = %key, depth = self.inner.depth, "Cache hit");
            return Ok(hit);
        }

        let descriptor = self
            .inner
            .registry
            .last_registered(&key)
            .ok_or_else(|| self.not_registered(key, checker.current()))?;

        if descriptor.lifetime().is_singleton() && !self.is_root() {
            return self.root().resolve_target(key, checker);
        }

        checker.enter(key)?;
        let built = self.materialize(descriptor, checker);
        checker.leave();
        let instance = built?;

        if descriptor.lifetime().is_cached() && !descriptor.is_provider_handle() {
            self.inner.cache.insert(key, instance.clone());
        }
        Ok(instance)
    }

    /// Multi-service resolution of a canonical element key.
    ///
    /// Cached entries come from this provider's list slots, transient
    /// entries are created on every call; the returned `Vec` is always new.
    fn resolve_list(&self, element: ServiceKey, mut checker: Option<&mut CycleChecker>) -> Result<Vec<Instance>> {
        let registry = &self.inner.registry;
        let route = registry.route(&element);
        let Some(descriptors) = registry.registered(&route.key) else {
            trace!(key = %element, "No registrations, resolving to empty list");
            return Ok(Vec::new());
        };

        let slots = self.list_slots(route.key, descriptors, checker.as_deref_mut())?;
        let mut items = Vec::with_capacity(descriptors.len());
        for (index, (descriptor, slot)) in descriptors.iter().zip(slots.iter()).enumerate() {
            let instance = match slot {
                Some(shared) => shared.clone(),
                None => self.resolve_element(route.key, index, descriptor, checker.as_deref_mut())?,
            };
            items.push(route.apply(instance)?);
        }
        Ok(items)
    }

    /// The shareable portion of a list, computed once per provider.
    ///
    /// The last slot goes through [`Provider::resolve_target`] so the list
    /// ends with the same object a single-service request returns.
    fn list_slots(
        &self,
        key: ServiceKey,
        descriptors: &[Descriptor],
        mut checker: Option<&mut CycleChecker>,
    ) -> Result<ListSlots> {
        let _guard = self.lock().acquire();

        if let Some(hit) = self.inner.lists.get(&key).map(|entry| entry.value().clone()) {
            return Ok(hit);
        }

        let last = descriptors.len().saturating_sub(1);
        let mut slots = Vec::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.iter().enumerate() {
            let slot = if !descriptor.lifetime().is_cached() {
                None
            } else if index == last {
                Some(with_checker(checker.as_deref_mut(), |c| self.resolve_target(key, c))?)
            } else {
                Some(self.resolve_element(key, index, descriptor, checker.as_deref_mut())?)
            };
            slots.push(slot);
        }

        let slots: ListSlots = slots.into();
        self.inner.lists.insert(key, slots.clone());
        debug!(key = %key, entries = slots.len(), depth = self.inner.depth, "Cached list");
        Ok(slots)
    }

    /// Resolves one list entry that is not reachable by key.
    fn resolve_element(
        &self,
        key: ServiceKey,
        index: usize,
        descriptor: &Descriptor,
        checker: Option<&mut CycleChecker>,
    ) -> Result<Instance> {
        let singleton = descriptor.lifetime().is_singleton();
        if singleton && !self.is_root() {
            return self.root().resolve_element(key, index, descriptor, checker);
        }

        let _guard = self.lock().acquire();
        if singleton {
            if let Some(hit) = self.inner.elements.get(&(key, index)).map(|entry| entry.value().clone()) {
                return Ok(hit);
            }
        }

        let instance = with_checker(checker, |c| {
            c.enter(key)?;
            let built = self.materialize(descriptor, c);
            c.leave();
            built
        })?;

        if singleton {
            self.inner.elements.insert((key, index), instance.clone());
        }
        Ok(instance)
    }

    /// Instantiates `descriptor` against this provider, validates the
    /// result and takes ownership of its disposer.
    ///
    /// A disposer whose instance is rejected after construction is entered
    /// and exited at once with the failure; it never reaches the stack.
    fn materialize(&self, descriptor: &Descriptor, checker: &mut CycleChecker) -> Result<Instance> {
        trace!(
            service = %descriptor.service(),
            lifetime = %descriptor.lifetime(),
            depth = checker.depth(),
            "Constructing"
        );

        let service = descriptor.service();
        let validator = if service.is::<dyn Validator>() {
            None
        } else {
            Some(self.validator(checker)?)
        };

        let Constructed { instance, disposer } = descriptor.instantiate(self, checker)?;

        let accepted = match &validator {
            Some(validator) => validator.verify(&service, &instance),
            None => Ok(()),
        }
        .and_then(|()| self.ensure_open(&service));

        match (accepted, disposer) {
            (Ok(()), Some(resource)) => {
                debug!(service = %service, depth = self.inner.depth, "Acquired disposable");
                self.inner.disposables.acquire(resource);
            }
            (Ok(()), None) => {}
            (Err(err), Some(resource)) => {
                debug!(service = %service, error = %err, "Releasing rejected disposable");
                resource.enter();
                resource.exit(&Outcome::Failed(&err));
                return Err(err);
            }
            (Err(err), None) => return Err(err),
        }
        Ok(instance)
    }

    fn validator(&self, checker: &mut CycleChecker) -> Result<Arc<dyn Validator>> {
        let key = ServiceKey::of::<dyn Validator>();
        match self.resolve_dependency(&key, checker)? {
            Argument::One(instance) => typed::<dyn Validator>(&key, &instance),
            Argument::Many(_) => Err(self.not_registered(key, checker.current())),
        }
    }

    fn cached(&self, key: &ServiceKey) -> Option<Instance> {
        self.inner.cache.get(key).map(|entry| entry.value().clone())
    }

    /// Only the root installs a lock; child scopes are single-owner.
    fn lock(&self) -> &dyn Lock {
        match self.inner.lock.get() {
            Some(lock) => &**lock,
            None => &UNGUARDED,
        }
    }

    fn ensure_open(&self, key: &ServiceKey) -> Result<()> {
        if self.is_closed() {
            return Err(WakilError::ScopeClosed { key: *key });
        }
        Ok(())
    }

    fn not_registered(&self, requested: ServiceKey, required_by: Option<ServiceKey>) -> WakilError {
        let names: Vec<&str> = self
            .inner
            .registry
            .registered_keys()
            .iter()
            .map(ServiceKey::type_name)
            .collect();

        WakilError::NotRegistered(NotRegisteredError {
            requested,
            required_by,
            suggestions: suggest_similar(requested.type_name(), &names, 3),
        })
    }
}

/// Runs `f` with the inherited cycle context, or a fresh one.
fn with_checker<R>(
    checker: Option<&mut CycleChecker>,
    f: impl FnOnce(&mut CycleChecker) -> Result<R>,
) -> Result<R> {
    match checker {
        Some(checker) => f(checker),
        None => f(&mut CycleChecker::new()),
    }
}

fn typed<T: ?Sized + Send + Sync + 'static>(key: &ServiceKey, instance: &Instance) -> Result<Arc<T>> {
    downcast::<T>(instance).ok_or_else(|| {
        WakilError::Validation(ValidationError {
            expected: *key,
            detail: format!("resolved instance is not an Arc<{}>", type_name::<T>()),
        })
    })
}

/// A provider is itself a scoped resource: exiting it closes it.
impl Disposable for Provider {
    fn exit(&self, outcome: &Outcome<'_>) {
        self.close_with(outcome);
    }
}

impl Drop for ProviderInner {
    fn drop(&mut self) {
        if !*self.closed.get_mut() {
            self.disposables.release_all(&Outcome::Completed);
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("root", &self.is_root())
            .field("depth", &self.inner.depth)
            .field("registered", &self.inner.registry.len())
            .field("cached", &self.inner.cache.len())
            .field("disposables", &self.inner.disposables.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
