//! # ferrous-resolve
//!
//! Callback-driven service resolution: a declarative list of service
//! descriptors is turned into an object graph on demand.
//!
//! ## Features
//!
//! - **Behaviors**: Singleton, Scoped and Prototype services, plus Inherited
//!   services whose behavior follows their dependencies
//! - **Static validation**: cycles, incompatible behaviors and unregistered
//!   dependencies are rejected when the provider is built
//! - **Callback resolution**: builds may complete synchronously or later;
//!   concurrent requests for a pending key share a single build
//! - **Scopes**: per-scope caches with teardown hooks
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_resolve::{Behavior, Key, Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_value(
//!     Key::name("db"),
//!     Database { connection_string: "postgres://localhost".to_string() },
//! );
//! services
//!     .add_factory(Key::name("users"), Behavior::Prototype, [Key::name("db")], |db: Arc<Database>| {
//!         anyhow::Ok(UserService { db })
//!     })
//!     .unwrap();
//!
//! let provider = services.build().unwrap();
//! let users = provider.get::<UserService>(&Key::name("users")).unwrap();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Behavior Inheritance
//!
//! A service registered as `Inherited` becomes `Scoped` when anything it
//! depends on needs a scope, and `Singleton` otherwise:
//!
//! ```rust
//! use ferrous_resolve::{Behavior, Key, Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct Request { path: String }
//! struct Handler { request: Arc<Request> }
//!
//! let mut services = ServiceCollection::new();
//! services.add_seeded(Key::name("request"));
//! services
//!     .add_factory(Key::name("handler"), Behavior::Inherited, [Key::name("request")], |request: Arc<Request>| {
//!         anyhow::Ok(Handler { request })
//!     })
//!     .unwrap();
//!
//! let provider = services.build().unwrap();
//! assert_eq!(provider.descriptor(&Key::name("handler")).unwrap().behavior(), Behavior::Scoped);
//!
//! let scoped = provider
//!     .create_scope(|seed| {
//!         seed.insert(Key::name("request"), Request { path: "/health".into() });
//!     })
//!     .unwrap();
//! let handler = scoped.get::<Handler>(&Key::name("handler")).unwrap();
//! assert_eq!(handler.request.path, "/health");
//! scoped.destroy_scope().unwrap();
//! ```
//!
//! ## Callback Resolution
//!
//! ```rust
//! use ferrous_resolve::{Behavior, Key, ResolverCore, ServiceCollection, ServiceDescriptor};
//! use std::sync::{Arc, Mutex};
//!
//! let parked = Arc::new(Mutex::new(None));
//! let slot = parked.clone();
//!
//! let mut services = ServiceCollection::new();
//! services.add(ServiceDescriptor::new(Key::name("slow"), Behavior::Singleton, [], move |_, completion| {
//!     *slot.lock().unwrap() = Some(completion);
//! }));
//! let provider = services.build().unwrap();
//!
//! let delivered = Arc::new(Mutex::new(Vec::new()));
//! for _ in 0..3 {
//!     let delivered = delivered.clone();
//!     provider
//!         .provide(&Key::name("slow"), Box::new(move |result| delivered.lock().unwrap().push(result.is_ok())))
//!         .unwrap();
//! }
//!
//! // One build serves every request once it completes.
//! parked.lock().unwrap().take().unwrap().resolve(42u32);
//! assert_eq!(*delivered.lock().unwrap(), vec![true, true, true]);
//! ```

pub mod behavior;
pub mod collection;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod factory;
pub mod graph;
pub mod key;
pub mod metadata;
pub mod observer;
pub mod provider;
pub mod resolution;
pub mod share;
pub mod traits;

#[cfg(feature = "async")]
pub mod async_factories;

mod internal;
mod registration;

pub use behavior::Behavior;
pub use collection::{ServiceCollection, ServiceCollectionExt, ServiceCollectionModuleExt, ServiceModule};
pub use config::{ConfigSource, ConfigSources, ConfigValue, EngineConfig, EnvironmentConfigSource, MemoryConfigSource};
pub use descriptors::{DescriptorKind, ServiceDescriptor};
pub use error::{DiError, DiResult, ErrorKind};
pub use factory::Factory;
pub use key::{key_of_trait, key_of_type, Key};
pub use metadata::{Injectable, MetadataRegistry, ParameterBinding, Projection, TypeMetadata};
pub use observer::{DiObserver, LoggingObserver};
pub use provider::{ScopeSeed, ServiceProvider, ServiceScope};
pub use resolution::{downcast, downcast_trait, AnyArc, Callback, Completion, Dependencies};
pub use share::{CallbackShare, Settle};
pub use traits::{OnScopeDestroy, Resolver, ResolverCore};

#[cfg(feature = "config")]
pub use config::JsonConfigSource;

#[cfg(feature = "async")]
pub use async_factories::AsyncFactory;
