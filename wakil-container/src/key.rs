//! Service identification keys.
//!
//! A [`ServiceKey`] names what is being requested from a provider: a
//! concrete type, a trait object, or the "list of T" wrapper used for
//! multi-service resolution.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use wakil_support::rendering::shorten_type_name;

/// A resolved service, type-erased.
///
/// A value resolved for service type `T` is always stored as an `Arc<T>`
/// boxed behind this alias, so `T` may be unsized (`dyn Trait`).
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Recovers the typed `Arc<T>` from an instance resolved for `T`.
#[inline]
pub fn downcast<T: ?Sized + Send + Sync + 'static>(instance: &Instance) -> Option<Arc<T>> {
    instance.downcast_ref::<Arc<T>>().cloned()
}

/// Uniquely identifies a service in the container.
///
/// # Examples
/// ```
/// use wakil_container::key::ServiceKey;
///
/// trait Plugin: Send + Sync {}
///
/// let key = ServiceKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert!(!key.is_list());
///
/// let plugins = ServiceKey::list_of::<dyn Plugin>();
/// assert!(plugins.is_list());
/// assert_eq!(plugins.element(), ServiceKey::of::<dyn Plugin>());
/// ```
#[derive(Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
    instance_type: TypeId,
    list: bool,
}

impl ServiceKey {
    /// Creates the key for service type `T`.
    #[inline]
    pub fn of<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            instance_type: TypeId::of::<Arc<T>>(),
            list: false,
        }
    }

    /// Creates the "list of T" key: every registration of `T`, in order.
    #[inline]
    pub fn list_of<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self { list: true, ..Self::of::<T>() }
    }

    /// Returns the [`TypeId`] of the service type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified service type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the service type name without module paths.
    pub fn short_name(&self) -> String {
        shorten_type_name(self.type_name)
    }

    /// Returns the [`TypeId`] of the `Arc<T>` carrier every instance of
    /// this key is stored as.
    #[inline]
    pub fn instance_type(&self) -> TypeId {
        self.instance_type
    }

    /// Returns `true` for "list of T" keys.
    #[inline]
    pub fn is_list(&self) -> bool {
        self.list
    }

    /// Returns the plain key of a list key (or the key itself).
    #[inline]
    pub fn element(&self) -> ServiceKey {
        Self { list: false, ..*self }
    }

    /// Returns `true` if this is the plain key of `T`.
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        !self.list && self.type_id == TypeId::of::<T>()
    }

    /// Returns `true` if `instance` is stored as this key's carrier type.
    #[inline]
    pub fn accepts(&self, instance: &Instance) -> bool {
        (**instance).type_id() == self.instance_type
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.list == other.list
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.list.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list {
            write!(f, "ServiceKey([{}])", self.type_name)
        } else {
            write!(f, "ServiceKey({})", self.type_name)
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list {
            write!(f, "[{}]", self.type_name)
        } else {
            write!(f, "{}", self.type_name)
        }
    }
}
