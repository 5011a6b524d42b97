//! Service lifetimes.
//!
//! A lifetime decides how a resolved service is shared:
//! - [`Lifetime::Singleton`]: one instance owned by the root provider
//! - [`Lifetime::Scoped`]: one instance per provider (root or child scope)
//! - [`Lifetime::Transient`]: a new instance on every request
//! - [`Lifetime::Instance`]: a pre-built value supplied at registration
use std::fmt;

/// Defines how long a resolved service lives.
///
/// # Examples
/// ```
/// use wakil_container::lifetime::Lifetime;
///
/// assert!(Lifetime::Singleton.outlives(Lifetime::Scoped));
/// assert!(Lifetime::Scoped.outlives(Lifetime::Transient));
/// assert!(!Lifetime::Transient.is_cached());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance for the lifetime of the root provider.
    ///
    /// Always created against, and cached by, the root provider, so every
    /// descendant scope observes the same object.
    Singleton,

    /// One instance per provider.
    ///
    /// Repeated requests within the same provider reuse it; sibling and
    /// nested scopes each get their own.
    Scoped,

    /// New instance on every request. Never cached.
    Transient,

    /// A pre-built value registered once and handed out as-is.
    Instance,
}

impl Lifetime {
    /// Returns `true` if resolved instances are cached.
    #[inline]
    pub fn is_cached(&self) -> bool {
        !matches!(self, Lifetime::Transient)
    }

    /// Returns `true` if instances are created against the root provider.
    #[inline]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Lifetime::Singleton)
    }

    /// Relative lifespan: higher lives longer.
    #[inline]
    pub fn rank(&self) -> u8 {
        match self {
            Lifetime::Singleton | Lifetime::Instance => 2,
            Lifetime::Scoped => 1,
            Lifetime::Transient => 0,
        }
    }

    /// Returns `true` if `self` lives strictly longer than `other`.
    #[inline]
    pub fn outlives(&self, other: Lifetime) -> bool {
        self.rank() > other.rank()
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Scoped => write!(f, "Scoped"),
            Lifetime::Transient => write!(f, "Transient"),
            Lifetime::Instance => write!(f, "Instance"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_ordering() {
        assert!(Lifetime::Singleton.outlives(Lifetime::Scoped));
        assert!(Lifetime::Scoped.outlives(Lifetime::Transient));
        assert!(!Lifetime::Instance.outlives(Lifetime::Singleton));
        assert!(!Lifetime::Transient.outlives(Lifetime::Transient));
    }

    #[test]
    fn lifetime_is_cached() {
        assert!(Lifetime::Singleton.is_cached());
        assert!(Lifetime::Scoped.is_cached());
        assert!(Lifetime::Instance.is_cached());
        assert!(!Lifetime::Transient.is_cached());
    }

    #[test]
    fn lifetime_display() {
        assert_eq!(format!("{}", Lifetime::Singleton), "Singleton");
        assert_eq!(format!("{}", Lifetime::Scoped), "Scoped");
        assert_eq!(format!("{}", Lifetime::Transient), "Transient");
        assert_eq!(format!("{}", Lifetime::Instance), "Instance");
    }
}
