//! Core container implementation for Wakil.

pub mod builder;
pub mod cycle;
pub mod descriptor;
pub mod dispose;
pub mod error;
mod graph;
pub mod key;
pub mod lifetime;
pub mod lock;
pub mod module;
pub mod provider;
pub mod registry;
pub mod scope;
pub mod validator;

pub use builder::{ContainerBuilder, prelude};
pub use descriptor::{Arguments, Descriptor, Injectable, Parameter, Upcast};
pub use dispose::{Disposable, Outcome};
pub use error::{Result, WakilError};
pub use key::{Instance, ServiceKey};
pub use lifetime::Lifetime;
pub use provider::Provider;
pub use scope::ScopeFactory;
