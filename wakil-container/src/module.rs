//! Module trait: a group of related registrations.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use wakil_container::prelude::*;
//!
//! struct Settings {
//!     url: &'static str,
//! }
//!
//! struct StorageModule;
//!
//! impl Module for StorageModule {
//!     fn register(&self, builder: ContainerBuilder) -> ContainerBuilder {
//!         builder.instance(Arc::new(Settings { url: "postgres://localhost" }))
//!     }
//! }
//!
//! let provider = Provider::builder().add_module(&StorageModule).build().unwrap();
//! assert_eq!(provider.require::<Settings>().unwrap().url, "postgres://localhost");
//! ```

use crate::builder::ContainerBuilder;

/// A reusable set of registrations.
///
/// Split registrations by concern instead of one giant block:
///
/// ```rust,ignore
/// Provider::builder()
///     .add_module(&StorageModule)
///     .add_module(&MailModule)
///     .build()?;
/// ```
pub trait Module: Send + Sync {
    /// Appends this module's registrations to `builder`.
    fn register(&self, builder: ContainerBuilder) -> ContainerBuilder;

    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Greeting(&'static str);

    struct GreetingModule;

    impl Module for GreetingModule {
        fn register(&self, builder: ContainerBuilder) -> ContainerBuilder {
            builder
                .instance(Arc::new(Greeting("salaam")))
                .transient_with::<String>([], |_| Ok(Arc::new(String::from("fresh"))))
        }
    }

    #[test]
    fn module_registers_services() {
        let provider = ContainerBuilder::new().add_module(&GreetingModule).build().unwrap();

        assert_eq!(provider.require::<Greeting>().unwrap().0, "salaam");
        assert_eq!(*provider.require::<String>().unwrap(), "fresh");
    }

    #[test]
    fn module_has_name() {
        assert!(GreetingModule.name().contains("GreetingModule"));
    }
}
