//! Post-construction validation.
//!
//! Every freshly constructed instance is handed to the registered
//! `dyn Validator` before it is cached or returned. Replace the default by
//! registering another implementation for `dyn Validator`.

use crate::error::{ValidationError, WakilError};
use crate::key::{Instance, ServiceKey};

/// Checks that a constructed instance conforms to its service type.
pub trait Validator: Send + Sync {
    fn verify(&self, expected: &ServiceKey, instance: &Instance) -> Result<(), WakilError>;
}

/// Default validator: the instance must be stored as `Arc<T>` for the
/// expected service type `T`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeValidator;

impl Validator for TypeValidator {
    fn verify(&self, expected: &ServiceKey, instance: &Instance) -> Result<(), WakilError> {
        if expected.accepts(instance) {
            return Ok(());
        }

        Err(WakilError::Validation(ValidationError {
            expected: *expected,
            detail: format!("instance is not an Arc<{}>", expected.type_name()),
        }))
    }
}
