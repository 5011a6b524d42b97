//! Deterministic release of scoped resources.
//!
//! Any resolved service may opt into the [`Disposable`] protocol. When a
//! provider acquires such a service it calls [`Disposable::enter`] and
//! pushes it on the provider's disposal stack; closing the provider calls
//! [`Disposable::exit`] on every entry, last acquired first.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

/// How the scope that owned a resource ended.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// The scope was closed normally.
    Completed,
    /// The work running inside the scope failed with this error.
    Failed(&'a (dyn std::error::Error + 'static)),
}

impl Outcome<'_> {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// A resource with an acquire/release pair tied to its provider's scope.
///
/// # Examples
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use wakil_container::dispose::{Disposable, Outcome};
///
/// struct Connection {
///     open: AtomicBool,
/// }
///
/// impl Disposable for Connection {
///     fn enter(&self) {
///         self.open.store(true, Ordering::SeqCst);
///     }
///
///     fn exit(&self, _outcome: &Outcome<'_>) {
///         self.open.store(false, Ordering::SeqCst);
///     }
/// }
/// ```
pub trait Disposable: Send + Sync {
    /// Called once, when the owning provider takes the resource.
    fn enter(&self) {}

    /// Called exactly once, when the owning provider is closed.
    ///
    /// An instance rejected right after construction, by the validator or
    /// because its provider closed meanwhile, is exited with
    /// [`Outcome::Failed`] straight after `enter`.
    fn exit(&self, outcome: &Outcome<'_>);
}

/// LIFO stack of acquired resources.
#[derive(Default)]
pub(crate) struct DisposeStack {
    entries: Mutex<Vec<Arc<dyn Disposable>>>,
}

impl DisposeStack {
    /// Enters `resource` and pushes it.
    pub(crate) fn acquire(&self, resource: Arc<dyn Disposable>) {
        resource.enter();
        self.entries.lock().push(resource);
    }

    /// Exits every resource, most recently acquired first.
    ///
    /// The lock is not held while `exit` runs, so a resource may still
    /// talk to its provider while being released.
    pub(crate) fn release_all(&self, outcome: &Outcome<'_>) -> usize {
        let mut released = 0;
        while let Some(resource) = self.pop() {
            resource.exit(outcome);
            released += 1;
        }
        trace!(released, "Released disposal stack");
        released
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn pop(&self) -> Option<Arc<dyn Disposable>> {
        self.entries.lock().pop()
    }
}
