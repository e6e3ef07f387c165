//! Resolver traits for service resolution.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::resolution::{downcast, downcast_trait, Callback};

/// Core resolver trait for object-safe, callback-based resolution.
///
/// Most users should use the [`Resolver`] trait instead, which provides typed
/// methods built on top of this trait.
pub trait ResolverCore: Send + Sync {
    /// Requests the value behind `key`.
    ///
    /// The callback runs at most once, either before `provide` returns or
    /// later when an asynchronous build completes. An unregistered key, or a
    /// scoped key requested without an active scope, is reported as `Err`
    /// right away and the callback is dropped without running.
    fn provide(&self, key: &Key, callback: Callback) -> DiResult<()>;

    /// Whether `key` is registered.
    fn has(&self, key: &Key) -> bool;
}

/// High-level resolver interface with typed helpers.
///
/// Blanket-implemented for every [`ResolverCore`].
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Key, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_value(Key::name("greeter"), Arc::new(English) as Arc<dyn Greeter>);
/// services.add_value(Key::name("count"), 3usize);
///
/// let provider = services.build().unwrap();
/// assert_eq!(provider.get_trait::<dyn Greeter>(&Key::name("greeter")).unwrap().greet(), "hello");
/// assert_eq!(*provider.get::<usize>(&Key::name("count")).unwrap(), 3);
/// ```
pub trait Resolver: ResolverCore {
    /// Requests a concrete value and downcasts it for the callback.
    fn provide_as<T, F>(&self, key: &Key, callback: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: FnOnce(DiResult<Arc<T>>) + Send + 'static,
    {
        let owned = key.clone();
        self.provide(key, Box::new(move |result| callback(result.and_then(|value| downcast::<T>(&owned, value)))))
    }

    /// Resolves a concrete value that completes synchronously.
    ///
    /// Fails with [`DiError::Pending`] when some build in the chain completes
    /// later; use [`resolve`](Self::resolve) or [`provide`](ResolverCore::provide)
    /// for those.
    fn get<T: Send + Sync + 'static>(&self, key: &Key) -> DiResult<Arc<T>> {
        let value = self.get_now(key)?;
        downcast::<T>(key, value)
    }

    /// Resolves a trait object registered as `Arc<dyn Trait>`.
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, key: &Key) -> DiResult<Arc<T>> {
        let value = self.get_now(key)?;
        downcast_trait::<T>(key, value)
    }

    #[doc(hidden)]
    fn get_now(&self, key: &Key) -> DiResult<crate::AnyArc> {
        let slot = Arc::new(Mutex::new(None));
        let sink = slot.clone();
        self.provide(key, Box::new(move |result| *sink.lock() = Some(result)))?;
        let result = slot.lock().take();
        result.unwrap_or_else(|| Err(DiError::Pending(key.clone())))
    }

    /// Resolves a concrete value, waiting for asynchronous builds.
    ///
    /// The request is issued when `resolve` is called, not when the future
    /// is first polled. The future borrows neither the resolver nor `key`.
    #[cfg(feature = "async")]
    fn resolve<T: Send + Sync + 'static>(
        &self,
        key: &Key,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = DiResult<Arc<T>>> + Send + 'static>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let issued = self.provide(
            key,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        let key = key.clone();
        Box::pin(async move {
            issued?;
            let value = rx.await.map_err(|_| DiError::Abandoned(key.clone()))??;
            downcast::<T>(&key, value)
        })
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
