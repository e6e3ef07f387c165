//! Scoped value caching and teardown.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::descriptors::TeardownFn;
use crate::error::DiResult;
use crate::internal::{map_with_capacity, Map};
use crate::key::Key;
use crate::resolution::{AnyArc, Callback};
use crate::share::CallbackShare;
use crate::traits::OnScopeDestroy;

/// Cache of scoped values for one unit of work, such as a request.
///
/// A scope holds at most one value per key. Concurrent requests for a key
/// that is being built are collapsed onto a single build through a
/// scope-local [`CallbackShare`]. Destroying the scope runs the teardown hook
/// of every cached entry, most recently cached first.
///
/// Scopes are created through
/// [`ServiceProvider::create_scope`](crate::ServiceProvider::create_scope),
/// which returns a provider view carrying the new scope.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Behavior, Key, Resolver, ServiceCollection};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let counter = Arc::new(AtomicU32::new(0));
/// let ids = counter.clone();
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_factory(Key::name("request_id"), Behavior::Scoped, [], move || {
///         anyhow::Ok(ids.fetch_add(1, Ordering::SeqCst))
///     })
///     .unwrap();
/// let provider = services.build().unwrap();
///
/// let first = provider.create_scope(|_| {}).unwrap();
/// let second = provider.create_scope(|_| {}).unwrap();
///
/// let a = first.get::<u32>(&Key::name("request_id")).unwrap();
/// let b = first.get::<u32>(&Key::name("request_id")).unwrap();
/// let c = second.get::<u32>(&Key::name("request_id")).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_ne!(*a, *c);
/// assert_eq!(first.scope().unwrap().len(), 1);
/// ```
pub struct ServiceScope {
    state: Mutex<ScopeState>,
    share: CallbackShare<Key, DiResult<AnyArc>>,
}

struct ScopeState {
    entries: Map<Key, ScopeEntry>,
    /// Cache order; teardown walks it backwards
    order: Vec<Key>,
    destroyed: bool,
}

struct ScopeEntry {
    value: AnyArc,
    teardown: Option<TeardownFn>,
}

impl ServiceScope {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ScopeState {
                entries: map_with_capacity(capacity),
                order: Vec::with_capacity(capacity),
                destroyed: false,
            }),
            share: CallbackShare::new(),
        })
    }

    pub(crate) fn seed(&self, seed: ScopeSeed) {
        for (key, value, teardown) in seed.entries {
            self.insert(key, value, teardown);
        }
    }

    /// Delivers the cached value for `key`, or runs `build` and caches its
    /// result.
    ///
    /// While a build is pending every further request for the key waits on
    /// it. Failures are delivered to every waiter and not cached.
    pub(crate) fn get<B>(self: &Arc<Self>, key: &Key, teardown: Option<TeardownFn>, build: B, callback: Callback)
    where
        B: FnOnce(Callback),
    {
        let cached = self.state.lock().entries.get(key).map(|entry| entry.value.clone());
        if let Some(value) = cached {
            debug!(%key, "scope cache hit");
            callback(Ok(value));
            return;
        }

        let scope = self.clone();
        self.share.share(
            key.clone(),
            move |settle| {
                let cached = scope.state.lock().entries.get(settle.key()).map(|entry| entry.value.clone());
                if let Some(value) = cached {
                    settle.settle(Ok(value));
                    return;
                }
                debug!(key = %settle.key(), "scope cache miss");
                build(Box::new(move |result| {
                    if let Ok(value) = &result {
                        scope.insert(settle.key().clone(), value.clone(), teardown);
                    }
                    settle.settle(result);
                }));
            },
            callback,
        );
    }

    fn insert(&self, key: Key, value: AnyArc, teardown: Option<TeardownFn>) {
        let mut state = self.state.lock();
        if state.destroyed {
            debug!(%key, "scope already destroyed, value not cached");
            return;
        }
        if state.entries.insert(key.clone(), ScopeEntry { value, teardown }).is_none() {
            state.order.push(key);
        }
    }

    /// Whether a value is cached for `key`.
    pub fn contains(&self, key: &Key) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Empties the cache one entry at a time, running teardown hooks.
    ///
    /// No lock is held while a hook runs. Returns the number of entries
    /// removed.
    pub(crate) fn destroy(&self) -> usize {
        self.state.lock().destroyed = true;
        let mut removed = 0;
        loop {
            let entry = {
                let mut state = self.state.lock();
                let Some(key) = state.order.pop() else {
                    break;
                };
                state.entries.remove(&key)
            };
            if let Some(entry) = entry {
                removed += 1;
                if let Some(teardown) = &entry.teardown {
                    teardown(&entry.value);
                }
            }
        }
        removed
    }
}

impl std::fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ServiceScope")
            .field("entries", &state.order)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

/// Values placed into a scope when it is created.
///
/// Seeded keys must be registered as scoped, usually through
/// [`ServiceDescriptor::seeded`](crate::ServiceDescriptor::seeded).
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Key, Resolver, ServiceCollection};
///
/// struct Request { path: String }
///
/// let mut services = ServiceCollection::new();
/// services.add_seeded(Key::name("request"));
/// let provider = services.build().unwrap();
///
/// let scoped = provider
///     .create_scope(|seed| {
///         seed.insert(Key::name("request"), Request { path: "/users".into() });
///     })
///     .unwrap();
/// assert_eq!(scoped.get::<Request>(&Key::name("request")).unwrap().path, "/users");
/// ```
#[derive(Default)]
pub struct ScopeSeed {
    entries: Vec<(Key, AnyArc, Option<TeardownFn>)>,
}

impl ScopeSeed {
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: Key, value: T) -> &mut Self {
        self.entries.push((key, Arc::new(value), None));
        self
    }

    /// Seeds a value whose [`OnScopeDestroy`] hook runs when the scope is
    /// destroyed.
    pub fn insert_with_teardown<T: OnScopeDestroy>(&mut self, key: Key, value: T) -> &mut Self {
        let teardown: TeardownFn = Arc::new(|value: &AnyArc| {
            if let Some(value) = value.downcast_ref::<T>() {
                value.on_scope_destroy();
            }
        });
        self.entries.push((key, Arc::new(value), Some(teardown)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn value(n: u8) -> AnyArc {
        Arc::new(n)
    }

    fn sink() -> (Arc<Mutex<Vec<DiResult<AnyArc>>>>, impl Fn() -> Callback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = seen.clone();
        (seen, move || {
            let store = store.clone();
            Box::new(move |result| store.lock().push(result))
        })
    }

    #[test]
    fn pending_builds_are_shared() {
        let scope = ServiceScope::new(0);
        let (seen, callback) = sink();
        let parked: Arc<Mutex<Vec<Callback>>> = Arc::new(Mutex::new(Vec::new()));
        let builds = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let parked = parked.clone();
            let builds = builds.clone();
            scope.get(
                &Key::name("db"),
                None,
                move |done| {
                    builds.fetch_add(1, Ordering::SeqCst);
                    parked.lock().push(done);
                },
                callback(),
            );
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(seen.lock().is_empty());

        let done = parked.lock().pop().unwrap();
        done(Ok(value(7)));
        assert_eq!(seen.lock().len(), 3);
        assert!(scope.contains(&Key::name("db")));
    }

    #[test]
    fn failures_are_not_cached() {
        let scope = ServiceScope::new(0);
        let (seen, callback) = sink();
        scope.get(
            &Key::name("db"),
            None,
            |done| done(Err(crate::DiError::Abandoned(Key::name("db")))),
            callback(),
        );
        assert!(seen.lock()[0].is_err());
        assert!(!scope.contains(&Key::name("db")));
    }

    #[test]
    fn destroy_runs_teardown_in_reverse_cache_order() {
        let scope = ServiceScope::new(2);
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in [1u8, 2] {
            let order = order.clone();
            let hook: TeardownFn = Arc::new(move |v: &AnyArc| order.lock().push(*v.downcast_ref::<u8>().unwrap()));
            scope.insert(Key::name(format!("k{n}")), value(n), Some(hook));
        }
        assert_eq!(scope.destroy(), 2);
        assert_eq!(*order.lock(), vec![2, 1]);
        assert!(scope.is_empty());
    }

    #[test]
    fn values_arriving_after_destroy_are_not_cached() {
        let scope = ServiceScope::new(0);
        let (seen, callback) = sink();
        let parked: Arc<Mutex<Option<Callback>>> = Arc::new(Mutex::new(None));
        let slot = parked.clone();
        scope.get(&Key::name("late"), None, move |done| *slot.lock() = Some(done), callback());

        scope.destroy();
        let done = parked.lock().take().unwrap();
        done(Ok(value(1)));
        assert_eq!(seen.lock().len(), 1);
        assert!(!scope.contains(&Key::name("late")));
    }
}
