//! Service collection module.
//!
//! This module contains the ServiceCollection type used to gather descriptors
//! and build service providers.

use std::sync::Arc;

use crate::behavior::Behavior;
use crate::config::EngineConfig;
use crate::descriptors::ServiceDescriptor;
use crate::error::DiResult;
use crate::factory::Factory;
use crate::key::Key;
use crate::metadata::{Injectable, TypeMetadata};
use crate::observer::{DiObserver, Observers};
use crate::resolution::Dependencies;
use crate::ServiceProvider;

pub mod module_system;
pub use module_system::*;

/// Ordered list of descriptors plus provider options.
///
/// Registering a key twice keeps the last descriptor, at the position of the
/// first registration. Nothing is validated until [`build`](Self::build).
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Behavior, Key, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Logger;
/// struct Request { id: u32 }
/// struct Handler { logger: Arc<Logger>, request: Arc<Request> }
///
/// let mut services = ServiceCollection::new();
/// services.add_value(Key::name("logger"), Logger);
/// services.add_factory(Key::name("request"), Behavior::Scoped, [], || anyhow::Ok(Request { id: 7 })).unwrap();
/// services
///     .add_factory(
///         Key::name("handler"),
///         Behavior::Inherited,
///         [Key::name("logger"), Key::name("request")],
///         |logger: Arc<Logger>, request: Arc<Request>| anyhow::Ok(Handler { logger, request }),
///     )
///     .unwrap();
///
/// let provider = services.build().unwrap();
/// let scoped = provider.create_scope(|_| {}).unwrap();
/// let handler = scoped.get::<Handler>(&Key::name("handler")).unwrap();
/// assert_eq!(handler.request.id, 7);
/// ```
#[derive(Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    observers: Observers,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a prebuilt descriptor.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Adds every descriptor of `descriptors`.
    pub fn extend(&mut self, descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> &mut Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Registers a fixed singleton value.
    ///
    /// Trait objects are registered as `Arc<dyn Trait>` and resolved with
    /// [`get_trait`](crate::Resolver::get_trait).
    pub fn add_value<T: Send + Sync + 'static>(&mut self, key: Key, value: T) -> &mut Self {
        self.add(ServiceDescriptor::value(key, value))
    }

    /// Registers a typed closure over `Arc` dependencies.
    ///
    /// See [`ServiceDescriptor::factory`].
    pub fn add_factory<Args, F>(
        &mut self,
        key: Key,
        behavior: Behavior,
        dependencies: impl IntoIterator<Item = Key>,
        factory: F,
    ) -> DiResult<&mut Self>
    where
        F: Factory<Args>,
    {
        let descriptor = ServiceDescriptor::factory(key, behavior, dependencies, factory)?;
        Ok(self.add(descriptor))
    }

    /// Registers an untyped closure over [`Dependencies`].
    pub fn add_fn<T, F>(
        &mut self,
        key: Key,
        behavior: Behavior,
        dependencies: impl IntoIterator<Item = Key>,
        f: F,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Dependencies) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::from_fn(key, behavior, dependencies, f))
    }

    /// Registers `T` with dependency keys from `metadata`.
    pub fn add_type<T: Injectable>(&mut self, metadata: &dyn TypeMetadata, behavior: Behavior) -> DiResult<&mut Self> {
        let descriptor = ServiceDescriptor::from_type::<T>(metadata, behavior)?;
        Ok(self.add(descriptor))
    }

    /// Registers a scoped key whose value is seeded into each scope.
    pub fn add_seeded(&mut self, key: Key) -> &mut Self {
        self.add(ServiceDescriptor::seeded(key))
    }

    /// Registers an observer of resolutions and scope lifecycles.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Whether a descriptor for `key` was added.
    pub fn contains(&self, key: &Key) -> bool {
        self.descriptors.iter().any(|descriptor| descriptor.key() == key)
    }

    /// Descriptors in registration order, duplicates included.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Builds a provider with the default [`EngineConfig`].
    pub fn build(self) -> DiResult<ServiceProvider> {
        self.build_with(EngineConfig::default())
    }

    /// Builds a provider with `config`.
    ///
    /// The graph is prepared and validated here; any cycle, incompatible
    /// behavior or unregistered dependency fails the build.
    pub fn build_with(self, config: EngineConfig) -> DiResult<ServiceProvider> {
        ServiceProvider::from_parts(self.descriptors, self.observers, config)
    }
}
