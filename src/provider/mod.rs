//! Service provider module.
//!
//! This module contains the ServiceProvider type: the prepared descriptor set,
//! the singleton cache and the callback-based resolution protocol.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, debug_span, error, info};

use crate::config::EngineConfig;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::graph;
use crate::internal::{new_map, Map};
use crate::key::Key;
use crate::observer::Observers;
use crate::registration::{Registration, Registry};
use crate::resolution::{AnyArc, Callback, Completion, Dependencies};
use crate::share::CallbackShare;
use crate::traits::ResolverCore;

pub(crate) mod fan_in;
pub mod scope;
pub(crate) mod strategy;

pub use scope::{ScopeSeed, ServiceScope};

type ScopeSlot = Arc<Mutex<Option<Arc<ServiceScope>>>>;

/// Service provider resolving keys into values.
///
/// A provider is built once from a descriptor list, which is validated and
/// has its inherited behaviors resolved at that point. Resolution is
/// callback based: [`provide`](ResolverCore::provide) delivers the value now
/// or later, and the typed helpers of [`Resolver`](crate::Resolver) build on
/// it.
///
/// # Provider Views
///
/// [`create_scope`](Self::create_scope) returns a new provider *view* that
/// shares the descriptor set, the singleton cache and the singleton share with
/// the provider it came from, and adds a scope of its own. Clones of a view
/// share its scope slot, so destroying the scope through one clone destroys it
/// for all of them.
///
/// # Thread Safety
///
/// ServiceProvider is `Send + Sync` and cheap to clone (it uses `Arc`
/// internally).
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Behavior, Key, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_value(Key::name("db"), Database { url: "postgres://localhost".to_string() });
/// services
///     .add_factory(Key::name("users"), Behavior::Prototype, [Key::name("db")], |db: Arc<Database>| {
///         anyhow::Ok(UserService { db })
///     })
///     .unwrap();
///
/// let provider = services.build().unwrap();
/// let users = provider.get::<UserService>(&Key::name("users")).unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
    scope: ScopeSlot,
}

pub(crate) struct ProviderInner {
    pub(crate) registry: Registry,
    pub(crate) singletons: Mutex<Map<Key, AnyArc>>,
    pub(crate) singleton_share: CallbackShare<Key, DiResult<AnyArc>>,
    pub(crate) observers: Observers,
    pub(crate) config: EngineConfig,
    /// Always empty; shared by every root view.
    root_slot: ScopeSlot,
}

impl ServiceProvider {
    /// Prepares `descriptors` and builds a provider over them.
    ///
    /// Fails with the first construction error found by graph preparation.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> DiResult<Self> {
        Self::from_parts(descriptors.into_iter().collect(), Observers::new(), EngineConfig::default())
    }

    pub(crate) fn from_parts(descriptors: Vec<ServiceDescriptor>, mut observers: Observers, config: EngineConfig) -> DiResult<Self> {
        let prepared = graph::prepare(descriptors, &config)?;
        let registry = Registry::from_prepared(prepared);
        if config.trace_resolutions {
            observers.add(Arc::new(crate::observer::LoggingObserver::new()));
        }
        info!(services = registry.len(), scoped = registry.scoped_count(), "service provider built");

        let root_slot: ScopeSlot = Arc::new(Mutex::new(None));
        Ok(Self {
            inner: Arc::new(ProviderInner {
                registry,
                singletons: Mutex::new(new_map()),
                singleton_share: CallbackShare::new(),
                observers,
                config,
                root_slot: root_slot.clone(),
            }),
            scope: root_slot,
        })
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    /// View over the same provider without a scope.
    pub(crate) fn root(&self) -> ServiceProvider {
        ServiceProvider {
            inner: self.inner.clone(),
            scope: self.inner.root_slot.clone(),
        }
    }

    /// The active scope of this view, if any.
    pub fn scope(&self) -> Option<Arc<ServiceScope>> {
        self.scope.lock().clone()
    }

    pub fn has_scope(&self) -> bool {
        self.scope.lock().is_some()
    }

    /// The configuration this provider was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Prepared descriptor for `key`.
    pub fn descriptor(&self, key: &Key) -> Option<&ServiceDescriptor> {
        self.inner.registry.get(key).map(|registration| registration.descriptor.as_ref())
    }

    /// All prepared descriptors, in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.inner.registry.iter().map(|registration| registration.descriptor.as_ref())
    }

    /// Creates a view of this provider with a fresh scope.
    ///
    /// `configure` can seed values into the scope before anything is
    /// resolved from it. Fails with [`DiError::ScopeAlreadyDefined`] when this
    /// view already has an active scope.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_resolve::{DiError, ServiceCollection};
    ///
    /// let provider = ServiceCollection::new().build().unwrap();
    /// let scoped = provider.create_scope(|_| {}).unwrap();
    /// assert!(scoped.has_scope());
    /// assert!(!provider.has_scope());
    /// assert!(matches!(scoped.create_scope(|_| {}), Err(DiError::ScopeAlreadyDefined)));
    /// ```
    pub fn create_scope<F>(&self, configure: F) -> DiResult<ServiceProvider>
    where
        F: FnOnce(&mut ScopeSeed),
    {
        if self.has_scope() {
            error!("scope is already defined on this provider");
            return Err(DiError::ScopeAlreadyDefined);
        }

        let mut seed = ScopeSeed::default();
        configure(&mut seed);
        let seeded = seed.len();
        let scope = ServiceScope::new(self.inner.registry.scoped_count());
        scope.seed(seed);

        debug!(seeded, "scope created");
        self.inner.observers.scope_created();
        Ok(ServiceProvider {
            inner: self.inner.clone(),
            scope: Arc::new(Mutex::new(Some(scope))),
        })
    }

    /// Destroys the scope of this view, running teardown hooks on its cached
    /// values.
    ///
    /// Fails with [`DiError::ScopeNotCreated`] when this view has no scope.
    /// Builds still pending in the scope complete normally for their waiters,
    /// but their values are not cached.
    pub fn destroy_scope(&self) -> DiResult<()> {
        let Some(scope) = self.scope.lock().take() else {
            error!("no scope to destroy on this provider");
            return Err(DiError::ScopeNotCreated);
        };
        let entries = scope.destroy();
        debug!(entries, "scope destroyed");
        self.inner.observers.scope_destroyed(entries);
        Ok(())
    }

    /// Resolves the dependencies of `registration`, then runs its build.
    pub(crate) fn build(&self, registration: &Arc<Registration>, callback: Callback) {
        let descriptor = registration.descriptor.clone();
        let key = descriptor.key().clone();
        debug!(%key, dependencies = descriptor.dependencies().len(), "building");

        let completion = Completion::new(key.clone(), callback);
        let keys = descriptor.dependency_keys();
        let requested = keys.clone();
        fan_in::resolve_all(self, &requested, move |resolved| match resolved {
            Ok(values) => (descriptor.build_fn())(Dependencies::new(key, keys, values), completion),
            Err(err) => completion.complete(Err(err)),
        });
    }

    /// Reports the outcome of a request to the observers.
    fn observe(&self, key: &Key, callback: Callback) -> Callback {
        let inner = self.inner.clone();
        let key = key.clone();
        let started = Instant::now();
        Box::new(move |result| {
            match &result {
                Ok(_) => inner.observers.resolved(&key, started.elapsed()),
                Err(err) => inner.observers.failed(&key, err),
            }
            callback(result)
        })
    }
}

impl ResolverCore for ServiceProvider {
    fn provide(&self, key: &Key, callback: Callback) -> DiResult<()> {
        let observed = self.inner.observers.has_observers();
        if observed {
            self.inner.observers.resolving(key);
        }

        let Some(registration) = self.inner.registry.get(key) else {
            error!(%key, "service not found");
            let err = DiError::NotFound(key.clone());
            if observed {
                self.inner.observers.failed(key, &err);
            }
            return Err(err);
        };

        let span = debug_span!("provide", %key, behavior = %registration.descriptor.behavior());
        let _entered = span.enter();

        let callback = if observed { self.observe(key, callback) } else { callback };
        let result = registration.strategy.provide(self, registration, callback);
        if let Err(err) = &result {
            if observed {
                self.inner.observers.failed(key, err);
            }
        }
        result
    }

    fn has(&self, key: &Key) -> bool {
        self.inner.registry.contains_key(key)
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("services", &self.inner.registry.len())
            .field("singletons", &self.inner.singletons.lock().len())
            .field("scope", &self.scope())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Behavior;
    use crate::{Resolver, ServiceCollection};
    use tracing_test::traced_test;

    fn provider(config: EngineConfig) -> ServiceProvider {
        let mut services = ServiceCollection::new();
        services.add_value(Key::name("port"), 8080u16);
        services
            .add_factory(Key::name("session"), Behavior::Scoped, [], || anyhow::Ok(String::from("s1")))
            .unwrap();
        services.build_with(config).unwrap()
    }

    #[test]
    #[traced_test]
    fn test_missing_service_is_logged() {
        let provider = provider(EngineConfig::default());
        assert!(provider.get::<u16>(&Key::name("ghost")).is_err());
        assert!(logs_contain("service not found"));
        assert!(logs_contain("name:ghost"));
    }

    #[test]
    #[traced_test]
    fn test_scope_misuse_is_logged() {
        let provider = provider(EngineConfig::default());
        assert!(provider.get::<String>(&Key::name("session")).is_err());
        assert!(logs_contain("scoped service requested without a scope"));

        assert!(provider.destroy_scope().is_err());
        assert!(logs_contain("no scope to destroy"));
    }

    #[test]
    #[traced_test]
    fn test_cache_activity_is_logged() {
        let provider = provider(EngineConfig::default());
        provider.get::<u16>(&Key::name("port")).unwrap();
        provider.get::<u16>(&Key::name("port")).unwrap();
        assert!(logs_contain("singleton cache miss"));
        assert!(logs_contain("singleton cache hit"));

        let scoped = provider.create_scope(|_| {}).unwrap();
        scoped.get::<String>(&Key::name("session")).unwrap();
        scoped.destroy_scope().unwrap();
        assert!(logs_contain("scope cache miss"));
        assert!(logs_contain("scope destroyed"));
    }

    #[test]
    #[traced_test]
    fn test_trace_resolutions_installs_logging_observer() {
        let provider = provider(EngineConfig {
            trace_resolutions: true,
            ..EngineConfig::default()
        });
        provider.get::<u16>(&Key::name("port")).unwrap();
        assert!(logs_contain("resolving"));
        assert!(logs_contain("resolved"));
        assert!(logs_contain("prefix=ferrous-resolve"));
    }

    #[test]
    fn test_root_view_has_no_scope() {
        let provider = provider(EngineConfig::default());
        let scoped = provider.create_scope(|_| {}).unwrap();
        assert!(scoped.has_scope());
        assert!(!scoped.root().has_scope());
        assert!(Arc::ptr_eq(&scoped.inner, &provider.inner));
    }
}
