//! Error types for Wakil container operations.
//!
//! Every failure is a configuration or topology bug, never a transient
//! condition: errors propagate synchronously and nothing is retried.

use std::fmt;

use wakil_support::rendering::render_chain;

use crate::key::ServiceKey;
use crate::lifetime::Lifetime;

/// Main error type for all Wakil operations.
#[derive(Debug, thiserror::Error)]
pub enum WakilError {
    /// Malformed registration, detected when it is registered.
    #[error("{}", .0)]
    Configuration(#[from] ConfigurationError),

    /// A required service has no registration.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// A service was requested again while it was still being constructed.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A constructed instance failed post-construction validation.
    #[error("{}", .0)]
    Validation(ValidationError),

    /// A longer-lived service consumes a shorter-lived one.
    ///
    /// Only reported by [`ContainerBuilder::validate`](crate::builder::ContainerBuilder::validate).
    #[error("{}", .0)]
    ScopeMismatch(ScopeMismatchError),

    /// A constructor or factory returned an error.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: ServiceKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The provider was closed before the request was made.
    #[error("Cannot resolve {key}: the provider has been closed")]
    ScopeClosed { key: ServiceKey },
}

impl WakilError {
    /// Wraps a factory failure for `key`.
    pub fn construction(
        key: ServiceKey,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        WakilError::ConstructionFailed { key, source: source.into() }
    }
}

/// Registration errors: the registration table itself is wrong.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigurationError {
    /// A parameter declares no service type and its name has no binding.
    #[error(
        "Cannot bind parameter `{parameter}` of {service}: no declared type and no name binding\n  Hint: call .bind::<T>(\"{parameter}\") before registering {service}"
    )]
    UnresolvableParameter {
        service: ServiceKey,
        parameter: &'static str,
    },

    /// A pre-built instance is not stored as the service's carrier type.
    #[error("Instance registered for {service} is not an Arc of that type")]
    InstanceTypeMismatch { service: ServiceKey },

    /// The lifetime cannot be combined with the registration kind.
    #[error("Lifetime {lifetime} is not valid for {service}: {reason}")]
    InvalidLifetime {
        service: ServiceKey,
        lifetime: Lifetime,
        reason: &'static str,
    },
}

/// Error when a service was not registered.
#[derive(Debug)]
pub struct NotRegisteredError {
    /// The service that was requested
    pub requested: ServiceKey,
    /// The service whose construction needed it, if any
    pub required_by: Option<ServiceKey>,
    /// Registered types with similar names
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not registered: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: Did you forget to register {}?",
            self.requested.short_name()
        )
    }
}

/// A resolution that re-entered a key already under construction.
///
/// The chain ends with the service that was re-entered.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Example: `[A, B, A]`
    pub chain: Vec<ServiceKey>,
}

impl CircularDependencyError {
    /// The service whose construction was re-entered.
    pub fn offending(&self) -> Option<&ServiceKey> {
        self.chain.last()
    }
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(|k| k.short_name()).collect();
        write!(f, "Circular dependency detected:\n  {}", render_chain(&names))?;
        write!(
            f,
            "\n  Hint: Inject the Provider and resolve lazily, or restructure the services"
        )
    }
}

/// Error when a constructed instance does not conform to its service type.
#[derive(Debug)]
pub struct ValidationError {
    pub expected: ServiceKey,
    pub detail: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed for {}: {}", self.expected, self.detail)
    }
}

/// Error when a service outlives one of its dependencies.
#[derive(Debug)]
pub struct ScopeMismatchError {
    pub dependency: ServiceKey,
    pub dependency_lifetime: Lifetime,
    pub consumer: ServiceKey,
    pub consumer_lifetime: Lifetime,
}

impl fmt::Display for ScopeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scope mismatch: {} ({}) depends on {} ({})",
            self.consumer, self.consumer_lifetime, self.dependency, self.dependency_lifetime,
        )?;
        write!(
            f,
            "\n  The {} instance would capture a single {} instance",
            self.consumer_lifetime, self.dependency_lifetime,
        )?;
        write!(
            f,
            "\n  Hint: Make {} {} or longer-lived",
            self.dependency.short_name(),
            self.consumer_lifetime,
        )
    }
}

/// Convenient Result type for Wakil operations.
pub type Result<T> = std::result::Result<T, WakilError>;
