//! Cycle detection for a single top-level resolution.
//!
//! A [`CycleChecker`] tracks the services currently under construction
//! along the active call stack. It is created fresh for each top-level
//! request and threaded through every nested resolution that request
//! triggers.

use std::collections::HashSet;

use tracing::warn;

use crate::error::{CircularDependencyError, WakilError};
use crate::key::ServiceKey;

/// The set of services being constructed, in entry order.
#[derive(Debug, Default)]
pub struct CycleChecker {
    chain: Vec<ServiceKey>,
    active: HashSet<ServiceKey>,
}

impl CycleChecker {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as under construction.
    ///
    /// # Errors
    /// [`WakilError::CircularDependency`] if `key` is already on the chain.
    pub fn enter(&mut self, key: ServiceKey) -> Result<(), WakilError> {
        if !self.active.insert(key) {
            let start = self.chain.iter().position(|k| *k == key).unwrap_or(0);
            let mut chain = self.chain[start..].to_vec();
            chain.push(key);

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(WakilError::CircularDependency(CircularDependencyError { chain }));
        }

        self.chain.push(key);
        Ok(())
    }

    /// Removes the most recently entered service.
    pub fn leave(&mut self) {
        if let Some(key) = self.chain.pop() {
            self.active.remove(&key);
        }
    }

    /// The service currently being constructed, if any.
    pub fn current(&self) -> Option<ServiceKey> {
        self.chain.last().copied()
    }

    /// Number of services under construction.
    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.active.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;
    struct C;

    #[test]
    fn enter_and_leave_nest() {
        let mut checker = CycleChecker::new();
        checker.enter(ServiceKey::of::<A>()).unwrap();
        checker.enter(ServiceKey::of::<B>()).unwrap();
        assert_eq!(checker.depth(), 2);
        assert_eq!(checker.current(), Some(ServiceKey::of::<B>()));

        checker.leave();
        assert_eq!(checker.current(), Some(ServiceKey::of::<A>()));
        assert!(!checker.contains(&ServiceKey::of::<B>()));

        // B may be entered again once it has left the chain.
        checker.enter(ServiceKey::of::<B>()).unwrap();
    }

    #[test]
    fn reentry_reports_cycle_from_first_occurrence() {
        let mut checker = CycleChecker::new();
        checker.enter(ServiceKey::of::<C>()).unwrap();
        checker.enter(ServiceKey::of::<A>()).unwrap();
        checker.enter(ServiceKey::of::<B>()).unwrap();

        match checker.enter(ServiceKey::of::<A>()) {
            Err(WakilError::CircularDependency(err)) => {
                assert_eq!(
                    err.chain,
                    vec![
                        ServiceKey::of::<A>(),
                        ServiceKey::of::<B>(),
                        ServiceKey::of::<A>(),
                    ]
                );
            }
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }

        // A failed entry leaves the chain untouched.
        assert_eq!(checker.depth(), 3);
    }

    #[test]
    fn self_reentry_is_a_cycle() {
        let mut checker = CycleChecker::new();
        checker.enter(ServiceKey::of::<A>()).unwrap();
        assert!(checker.enter(ServiceKey::of::<A>()).is_err());
    }

    #[test]
    fn leave_on_empty_is_noop() {
        let mut checker = CycleChecker::new();
        checker.leave();
        assert_eq!(checker.depth(), 0);
    }
}
