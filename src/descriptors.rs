//! Service descriptors: what a provider knows about each key.

use std::sync::Arc;

use crate::behavior::Behavior;
use crate::error::DiResult;
use crate::factory::{check_arity, Factory};
use crate::key::Key;
use crate::resolution::{AnyArc, Completion, Dependencies};
use crate::traits::OnScopeDestroy;

/// Erased build function. Receives resolved dependencies in declaration order
/// and delivers its result through the completion, now or later.
pub(crate) type BuildFn = Arc<dyn Fn(Dependencies, Completion) + Send + Sync>;

/// Erased teardown hook, run on a cached value when its scope is destroyed.
pub(crate) type TeardownFn = Arc<dyn Fn(&AnyArc) + Send + Sync>;

/// How a descriptor was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Fixed value
    Value,
    /// Build function with explicit dependencies
    Factory,
    /// Constructible type with dependencies from a metadata source
    Type,
}

/// Immutable record describing how to build the value behind a key.
///
/// A descriptor bundles the key, the declared dependency keys, a lifetime
/// [`Behavior`] and a build function. Descriptors are cheap to clone: the
/// build function and dependency list are shared.
///
/// # Creation Modes
///
/// - [`ServiceDescriptor::value`]: a fixed value, always `Singleton`
/// - [`ServiceDescriptor::factory`]: a typed closure over `Arc` dependencies
/// - [`ServiceDescriptor::from_fn`]: an untyped closure over [`Dependencies`]
/// - [`ServiceDescriptor::new`]: a callback build that may complete later
/// - [`ServiceDescriptor::from_type`] / [`ServiceDescriptor::from_member`]:
///   dependencies come from a [`TypeMetadata`](crate::TypeMetadata) source
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Behavior, DescriptorKind, Key, ServiceDescriptor};
/// use std::sync::Arc;
///
/// let port = ServiceDescriptor::value(Key::name("port"), 5432u16);
/// assert_eq!(port.behavior(), Behavior::Singleton);
/// assert_eq!(port.kind(), DescriptorKind::Value);
/// assert!(port.dependencies().is_empty());
///
/// let url = ServiceDescriptor::factory(
///     Key::name("url"),
///     Behavior::Inherited,
///     [Key::name("port")],
///     |port: Arc<u16>| anyhow::Ok(format!("postgres://localhost:{port}")),
/// )
/// .unwrap();
/// assert_eq!(url.dependencies(), &[Key::name("port")]);
/// assert!(url.origin().is_none());
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    key: Key,
    dependencies: Arc<[Key]>,
    behavior: Behavior,
    build: BuildFn,
    teardown: Option<TeardownFn>,
    origin: Option<Arc<ServiceDescriptor>>,
    kind: DescriptorKind,
    impl_type_name: Option<&'static str>,
}

impl ServiceDescriptor {
    /// Creates a descriptor from a callback build function.
    ///
    /// The build receives the resolved dependencies and a [`Completion`]. It
    /// may complete synchronously or move the completion elsewhere and
    /// complete it later. Dropping the completion delivers
    /// [`DiError::Abandoned`](crate::DiError::Abandoned).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_resolve::{Behavior, Key, Resolver, ServiceCollection, ServiceDescriptor};
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_value(Key::name("base"), 40u32);
    /// services.add(ServiceDescriptor::new(
    ///     Key::name("answer"),
    ///     Behavior::Singleton,
    ///     [Key::name("base")],
    ///     |deps, completion| match deps.get::<u32>(0) {
    ///         Ok(base) => completion.resolve(*base + 2),
    ///         Err(err) => completion.complete(Err(err)),
    ///     },
    /// ));
    ///
    /// let provider = services.build().unwrap();
    /// assert_eq!(*provider.get::<u32>(&Key::name("answer")).unwrap(), 42);
    /// ```
    pub fn new<F>(key: Key, behavior: Behavior, dependencies: impl IntoIterator<Item = Key>, build: F) -> Self
    where
        F: Fn(Dependencies, Completion) + Send + Sync + 'static,
    {
        Self {
            key,
            dependencies: dependencies.into_iter().collect(),
            behavior,
            build: Arc::new(build),
            teardown: None,
            origin: None,
            kind: DescriptorKind::Factory,
            impl_type_name: None,
        }
    }

    /// Creates a descriptor for a fixed value.
    ///
    /// The behavior is always `Singleton` and every request yields the same
    /// `Arc`. Trait objects are registered as `Arc<dyn Trait>` values.
    pub fn value<T: Send + Sync + 'static>(key: Key, value: T) -> Self {
        let value: AnyArc = Arc::new(value);
        let mut descriptor = Self::new(key, Behavior::Singleton, [], move |_, completion| {
            completion.complete(Ok(value.clone()))
        });
        descriptor.kind = DescriptorKind::Value;
        descriptor.impl_type_name = Some(std::any::type_name::<T>());
        descriptor
    }

    /// Creates a descriptor from a typed closure.
    ///
    /// Fails with [`DiError::ArityMismatch`](crate::DiError::ArityMismatch)
    /// when the closure takes more parameters than `dependencies` lists.
    pub fn factory<Args, F>(
        key: Key,
        behavior: Behavior,
        dependencies: impl IntoIterator<Item = Key>,
        factory: F,
    ) -> DiResult<Self>
    where
        F: Factory<Args>,
    {
        let dependencies: Arc<[Key]> = dependencies.into_iter().collect();
        check_arity::<Args, F>(&key, dependencies.len())?;

        let mut descriptor = Self::new(key, behavior, [], move |deps, completion| {
            match factory.call(&deps) {
                Ok(value) => completion.resolve(value),
                Err(err) => completion.complete(Err(err)),
            }
        });
        descriptor.dependencies = dependencies;
        descriptor.impl_type_name = Some(std::any::type_name::<F::Output>());
        Ok(descriptor)
    }

    /// Creates a descriptor from an untyped synchronous closure.
    pub fn from_fn<T, F>(key: Key, behavior: Behavior, dependencies: impl IntoIterator<Item = Key>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Dependencies) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let mut descriptor = Self::new(key, behavior, dependencies, move |deps, completion| match f(&deps) {
            Ok(value) => completion.resolve(value),
            Err(err) => completion.fail(err),
        });
        descriptor.impl_type_name = Some(std::any::type_name::<T>());
        descriptor
    }

    /// Creates a scoped descriptor whose value is supplied when a scope is
    /// created, see [`ScopeSeed`](crate::ScopeSeed).
    ///
    /// Resolving the key in a scope that was not seeded with it fails.
    pub fn seeded(key: Key) -> Self {
        Self::new(key, Behavior::Scoped, [], |_, completion| {
            let key = completion.key().clone();
            completion.fail(anyhow::anyhow!("{key} was not seeded into the scope"))
        })
    }

    /// Runs [`OnScopeDestroy`] on values of this descriptor when their scope
    /// is destroyed.
    ///
    /// Only cached scoped values are torn down. Values of other types are
    /// ignored.
    pub fn with_teardown<T: OnScopeDestroy>(self) -> Self {
        self.with_teardown_fn(|value: &AnyArc| {
            if let Some(value) = value.downcast_ref::<T>() {
                value.on_scope_destroy();
            }
        })
    }

    /// Like [`with_teardown`](Self::with_teardown) with an arbitrary hook.
    pub fn with_teardown_fn<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AnyArc) + Send + Sync + 'static,
    {
        self.teardown = Some(Arc::new(hook));
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Declared dependency keys, in build-parameter order.
    pub fn dependencies(&self) -> &[Key] {
        &self.dependencies
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    /// The descriptor this one was resolved from, when its behavior was
    /// `Inherited` before graph preparation.
    pub fn origin(&self) -> Option<&ServiceDescriptor> {
        self.origin.as_deref()
    }

    /// Name of the built type, when known.
    pub fn impl_type_name(&self) -> Option<&'static str> {
        self.impl_type_name
    }

    pub fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    pub(crate) fn build_fn(&self) -> &BuildFn {
        &self.build
    }

    pub(crate) fn dependency_keys(&self) -> Arc<[Key]> {
        self.dependencies.clone()
    }

    pub(crate) fn teardown(&self) -> Option<TeardownFn> {
        self.teardown.clone()
    }

    pub(crate) fn set_kind(&mut self, kind: DescriptorKind, impl_type_name: &'static str) {
        self.kind = kind;
        self.impl_type_name = Some(impl_type_name);
    }

    pub(crate) fn set_dependencies(&mut self, dependencies: Arc<[Key]>) {
        self.dependencies = dependencies;
    }

    /// New descriptor with a concrete behavior, remembering `self` as origin.
    pub(crate) fn resolved_as(&self, behavior: Behavior) -> Self {
        let mut resolved = self.clone();
        resolved.behavior = behavior;
        resolved.origin = Some(Arc::new(self.clone()));
        resolved
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("key", &self.key)
            .field("behavior", &self.behavior)
            .field("dependencies", &self.dependencies)
            .field("kind", &self.kind)
            .field("impl_type_name", &self.impl_type_name)
            .field("inherited", &self.origin.is_some())
            .finish()
    }
}
