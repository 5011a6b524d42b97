//! Cache guard used by the root provider.
//!
//! The lock is an ordinary service registered as `dyn Lock`. The default
//! registration is [`NoopLock`]; [`ContainerBuilder::thread_safe`](crate::builder::ContainerBuilder::thread_safe)
//! rebinds it to [`ReentrantLock`]. Only the root provider installs the
//! registered lock; child scopes always use [`NoopLock`].

use parking_lot::ReentrantMutex;

/// Anything that must stay alive while the guard is held.
pub trait Held {}

impl<T: ?Sized> Held for T {}

/// Scoped acquisition of a [`Lock`]. Releases on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    held: Option<Box<dyn Held + 'a>>,
}

impl<'a> LockGuard<'a> {
    /// A guard that holds nothing.
    pub fn unguarded() -> Self {
        Self { held: None }
    }

    /// Keeps `held` (typically a mutex guard) alive until this guard drops.
    pub fn holding(held: impl Held + 'a) -> Self {
        Self { held: Some(Box::new(held)) }
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }
}

/// Guards the check-then-populate sequence of a provider cache.
///
/// Implementations must be reentrant: resolving a singleton on the root
/// provider resolves its dependencies on the root provider too.
pub trait Lock: Send + Sync {
    fn acquire(&self) -> LockGuard<'_>;
}

/// Always available, never blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLock;

impl Lock for NoopLock {
    fn acquire(&self) -> LockGuard<'_> {
        LockGuard::unguarded()
    }
}

/// Reentrant mutual exclusion.
#[derive(Default)]
pub struct ReentrantLock {
    mutex: ReentrantMutex<()>,
}

impl ReentrantLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lock for ReentrantLock {
    fn acquire(&self) -> LockGuard<'_> {
        LockGuard::holding(self.mutex.lock())
    }
}
