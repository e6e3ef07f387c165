//! Observation hooks for resolutions and scope lifecycles.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::DiError;
use crate::key::Key;

/// Observer for resolution events.
///
/// Observers see every request made through
/// [`provide`](crate::ResolverCore::provide): when it starts, and when its
/// callback receives a value or an error. For values that complete later,
/// `resolved` reports the time until the callback ran.
///
/// Observer calls are made synchronously on the resolving path. Keep
/// implementations lightweight.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{DiError, DiObserver, Key, Resolver, ServiceCollection};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Counting(AtomicUsize);
///
/// impl DiObserver for Counting {
///     fn resolving(&self, _key: &Key) {}
///     fn resolved(&self, _key: &Key, _duration: Duration) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
///     fn failed(&self, _key: &Key, _error: &DiError) {}
/// }
///
/// let counting = Arc::new(Counting::default());
/// let mut services = ServiceCollection::new();
/// services.add_value(Key::name("n"), 1u8);
/// services.add_observer(counting.clone());
///
/// let provider = services.build().unwrap();
/// provider.get::<u8>(&Key::name("n")).unwrap();
/// assert_eq!(counting.0.load(Ordering::SeqCst), 1);
/// ```
pub trait DiObserver: Send + Sync {
    /// Called when a request for `key` starts.
    fn resolving(&self, key: &Key);

    /// Called when the request's callback receives a value.
    fn resolved(&self, key: &Key, duration: Duration);

    /// Called when the request fails, synchronously or through its callback.
    fn failed(&self, key: &Key, error: &DiError);

    /// Called after a scope was created.
    fn scope_created(&self) {}

    /// Called after a scope was destroyed, with the number of torn down entries.
    fn scope_destroyed(&self, entries: usize) {
        let _ = entries;
    }
}

/// Container for registered observers.
///
/// Designed to have no overhead on the resolving path when empty.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &Key) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, key: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.failed(key, error);
        }
    }

    pub(crate) fn scope_created(&self) {
        for observer in &self.observers {
            observer.scope_created();
        }
    }

    pub(crate) fn scope_destroyed(&self, entries: usize) {
        for observer in &self.observers {
            observer.scope_destroyed(entries);
        }
    }
}

/// Built-in observer that forwards events to `tracing`.
///
/// Installed automatically when
/// [`EngineConfig::trace_resolutions`](crate::EngineConfig::trace_resolutions)
/// is set.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{LoggingObserver, ServiceCollection};
/// use std::sync::Arc;
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(LoggingObserver::new()));
/// let provider = services.build().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            prefix: "ferrous-resolve".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for LoggingObserver {
    fn resolving(&self, key: &Key) {
        debug!(prefix = %self.prefix, %key, "resolving");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        info!(prefix = %self.prefix, %key, ?duration, "resolved");
    }

    fn failed(&self, key: &Key, error: &DiError) {
        warn!(prefix = %self.prefix, %key, %error, "resolution failed");
    }

    fn scope_created(&self) {
        debug!(prefix = %self.prefix, "scope created");
    }

    fn scope_destroyed(&self, entries: usize) {
        debug!(prefix = %self.prefix, entries, "scope destroyed");
    }
}
