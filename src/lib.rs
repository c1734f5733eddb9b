//! # Revolve - Single-Shot Dependency Resolution for Rust
//!
//! Declare what your application has — pre-built values, constructors,
//! entry points — and let the resolver figure out which constructors must
//! run, in which order, to satisfy the entry points. One call, one graph,
//! no leftover container.
//!
//! ## Features
//!
//! - **Demand-driven** - Only constructors an entry point transitively needs are run
//! - **Order-free registration** - Options may arrive in any order; linking is by type
//! - **Single-shot** - Each constructor runs at most once; the graph is dropped on return
//! - **Unambiguous** - Two producers for one input type is an error, not a coin flip
//! - **Cycle-aware** - Dependency cycles are rejected with the full path in the error
//! - **Cooperatively cancellable** - A [`CancelToken`] is honored at every node boundary
//! - **Duck typing (opt-in)** - Declared conformances let concrete values satisfy trait-object parameters
//! - **Dry run** - Validate parsing, linking and cycles without invoking anything
//!
//! ## Quick Start
//!
//! ```rust
//! use revolve::{invoke, provide, revolve, supply, CancelToken};
//! use std::sync::Arc;
//!
//! struct Config {
//!     url: &'static str,
//! }
//!
//! struct Database {
//!     url: String,
//! }
//!
//! fn make_database(config: Arc<Config>) -> Arc<Database> {
//!     Arc::new(Database {
//!         url: config.url.to_string(),
//!     })
//! }
//!
//! let token = CancelToken::new();
//! revolve(
//!     &token,
//!     [
//!         supply(Config { url: "postgres://localhost" }),
//!         provide(make_database),
//!         invoke(|db: Arc<Database>| {
//!             assert_eq!(db.url, "postgres://localhost");
//!         }),
//!     ],
//! )
//! .unwrap();
//! ```
//!
//! ## Fallible constructors
//!
//! A constructor or entry point may return `Result<_, E>` for any error
//! type; the first failure aborts the resolve and the error comes back
//! unwrapped:
//!
//! ```rust
//! use revolve::{invoke, provide, revolve, CancelToken};
//! use std::sync::Arc;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("config file missing")]
//! struct ConfigMissing;
//!
//! struct Config;
//!
//! let err = revolve(
//!     &CancelToken::new(),
//!     [
//!         provide(|| -> Result<Arc<Config>, ConfigMissing> { Err(ConfigMissing) }),
//!         invoke(|_config: Arc<Config>| {}),
//!     ],
//! )
//! .unwrap_err();
//!
//! assert!(err.user_error().unwrap().downcast_ref::<ConfigMissing>().is_some());
//! ```
//!
//! ## Duck typing
//!
//! Strict mode links by type identity. With
//! [`with_duck_typing`] and declared [`conforms!`] entries, a concrete
//! value satisfies a trait-object parameter:
//!
//! ```rust
//! use revolve::{conforms, invoke, revolve, supply, with_conformances,
//!               with_duck_typing, CancelToken};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn hello(&self) -> &'static str;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn hello(&self) -> &'static str {
//!         "hello"
//!     }
//! }
//!
//! revolve(
//!     &CancelToken::new(),
//!     [
//!         with_duck_typing(),
//!         with_conformances(conforms!(English => dyn Greeter)),
//!         supply(English),
//!         invoke(|greeter: Arc<dyn Greeter>| {
//!             assert_eq!(greeter.hello(), "hello");
//!         }),
//!     ],
//! )
//! .unwrap();
//! ```

mod cancel;
mod error;
mod executor;
mod introspect;
mod logger;
mod node;
mod option;
mod resolver;

pub use cancel::CancelToken;
pub use error::{BoxError, ResolveError, Result};
pub use introspect::{Conformance, TypeSpec, Value};
pub use logger::{DiscardLogger, LogFn, LogLevel, Logger, StdLogger};
pub use node::{Outputs, ResolveFn};
pub use option::{
    invoke, options, provide, supply, supply_arc, with_conformances, with_dry_run,
    with_duck_typing, with_logger, with_std_logger, IntoLoggerTarget, LoggerTarget, Opt,
};
pub use resolver::revolve;

#[cfg(feature = "tracing")]
pub use logger::TracingLogger;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        invoke, options, provide, revolve, supply, supply_arc, with_conformances, with_dry_run,
        with_duck_typing, with_logger, CancelToken, LogLevel, Logger, Opt, ResolveError, Result,
    };
    pub use std::sync::Arc;
}
