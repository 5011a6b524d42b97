//! # Wakil: lifetime-aware inversion-of-control container
//!
//! Declare services with a lifetime, build a root [`Provider`], and resolve
//! object graphs from it or from child scopes.
//!
//! ```rust
//! use std::sync::Arc;
//! use wakil::prelude::*;
//!
//! struct Config {
//!     url: &'static str,
//! }
//!
//! #[derive(Injectable)]
//! struct Database {
//!     config: Arc<Config>,
//! }
//!
//! #[derive(Injectable)]
//! struct Request {
//!     db: Arc<Database>,
//! }
//!
//! let root = Provider::builder()
//!     .instance(Arc::new(Config { url: "postgres://localhost" }))
//!     .singleton::<Database>()
//!     .scoped::<Request>()
//!     .build()?;
//!
//! root.with_scope(|scope| {
//!     let request = scope.require::<Request>()?;
//!     assert_eq!(request.db.config.url, "postgres://localhost");
//!     Ok::<_, WakilError>(())
//! })?;
//! # Ok::<(), WakilError>(())
//! ```

pub use wakil_container::*;
pub use wakil_macros::*;
pub use wakil_support::*;

/// Everything needed to register and resolve services, including the
/// `Injectable` derive.
pub mod prelude {
    pub use wakil_container::prelude::*;
    pub use wakil_container::upcast;
    pub use wakil_macros::Injectable;
}
