//! # Autowire - Definition-Driven Dependency Injection for Rust
//!
//! A dependency injection engine that resolves string identifiers to values
//! by following declarative definitions: literal values, objects built from
//! registered classes, factories, aliases, environment variables,
//! collections and decorators.
//!
//! ## Features
//!
//! - **Source chain** - Runtime overrides, explicit definitions and autowiring, first hit wins
//! - **Autowiring** - Constructor parameters typed with a class are resolved automatically
//! - **Singletons and prototypes** - Cached once or rebuilt on every `get`
//! - **Lazy proxies** - Construction deferred until the object is first used
//! - **Cycle breaking** - A→B→A resolves by handing B a deferred proxy for A
//! - **Lock-free cache** - Singletons live in a `DashMap` shared across threads
//! - **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use autowire::prelude::*;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = ContainerBuilder::new()
//!     .register_class(
//!         ClassDescriptor::builder::<Database>("Database")
//!             .constructor(vec![ParamSpec::scalar("url", "string")], |args| {
//!                 Ok(Database { url: args.string(0)? })
//!             })
//!             .build(),
//!     )
//!     .register_class(
//!         ClassDescriptor::builder::<UserService>("UserService")
//!             .constructor(vec![ParamSpec::class("db", "Database")], |args| {
//!                 Ok(UserService { db: args.object::<Database>(0)? })
//!             })
//!             .build(),
//!     )
//!     .define(
//!         ObjectDefinition::autowire("Database")
//!             .constructor_arg("url", ArgumentSpec::value("postgres://localhost")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! // UserService is autowired: its `db` parameter resolves through "Database".
//! let users = container.get("UserService").unwrap().downcast::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Definitions
//!
//! ```rust
//! use autowire::prelude::*;
//! use autowire::MapEnvironment;
//!
//! let container = ContainerBuilder::new()
//!     .environment(MapEnvironment::new().set("APP_ENV", "prod"))
//!     .define(Definition::value("app.name", "shop"))
//!     .define(Definition::alias("name", "app.name"))
//!     .define(Definition::env_or("env", "APP_ENV", ArgumentSpec::value("dev")))
//!     .define(Definition::collection(
//!         "tags",
//!         vec![ArgumentSpec::link("app.name"), ArgumentSpec::link("env")],
//!     ))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(container.get("name").unwrap(), Value::from("shop"));
//! assert_eq!(container.get("tags").unwrap().to_string(), "[shop, prod]");
//! ```

mod binder;
mod container;
mod definition;
mod error;
#[cfg(feature = "logging")]
pub mod logging;
pub mod proxy;
mod reflection;
mod resolver;
mod source;
mod value;

pub use container::*;
pub use definition::*;
pub use error::*;
pub use reflection::*;
pub use source::*;
pub use value::*;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ArgKey, ArgumentSpec, Arguments, Callable, ClassDescriptor, Container, ContainerBuilder,
        Definition, DiError, ErrorKind, FactoryDefinition, ObjectDefinition, ObjectRef, ParamSpec,
        ParamType, Result, Scope, Value,
    };
    pub use std::sync::Arc;
}
