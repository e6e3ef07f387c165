//! Async factory support.
//!
//! Builds that need asynchronous initialization (network handshakes, pool
//! warm-up) run as tokio tasks and complete their callback when the future
//! resolves. Every waiter collapsed onto the pending key is notified then.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::behavior::Behavior;
use crate::descriptors::ServiceDescriptor;
use crate::key::Key;
use crate::resolution::Dependencies;

/// Trait for factories that create services asynchronously.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{AsyncFactory, Behavior, Dependencies, Key, Resolver, ServiceCollection, ServiceDescriptor};
/// use async_trait::async_trait;
///
/// struct DatabasePool {
///     connection_string: String,
/// }
///
/// struct PoolFactory;
///
/// #[async_trait]
/// impl AsyncFactory<DatabasePool> for PoolFactory {
///     async fn create(&self, deps: Dependencies) -> anyhow::Result<DatabasePool> {
///         let url = deps.get::<String>(0)?;
///         tokio::task::yield_now().await;
///         Ok(DatabasePool { connection_string: url.to_string() })
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let mut services = ServiceCollection::new();
/// services.add_value(Key::name("url"), "postgres://localhost".to_string());
/// services.add(ServiceDescriptor::async_factory(
///     Key::name("pool"),
///     Behavior::Singleton,
///     [Key::name("url")],
///     PoolFactory,
/// ));
///
/// let provider = services.build()?;
/// let pool = provider.resolve::<DatabasePool>(&Key::name("pool")).await?;
/// assert_eq!(pool.connection_string, "postgres://localhost");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait AsyncFactory<T: Send + Sync + 'static>: Send + Sync {
    /// Creates a new instance from its resolved dependencies.
    async fn create(&self, deps: Dependencies) -> anyhow::Result<T>;
}

/// Async closures are factories.
#[async_trait]
impl<T, F, Fut> AsyncFactory<T> for F
where
    T: Send + Sync + 'static,
    F: Fn(Dependencies) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<T>> + Send,
{
    async fn create(&self, deps: Dependencies) -> anyhow::Result<T> {
        self(deps).await
    }
}

impl ServiceDescriptor {
    /// Creates a descriptor whose build runs `factory` on the current tokio
    /// runtime.
    ///
    /// Requesting the key outside a runtime fails the build.
    pub fn async_factory<T, A>(
        key: Key,
        behavior: Behavior,
        dependencies: impl IntoIterator<Item = Key>,
        factory: A,
    ) -> Self
    where
        T: Send + Sync + 'static,
        A: AsyncFactory<T> + 'static,
    {
        let factory = Arc::new(factory);
        let mut descriptor = ServiceDescriptor::new(key, behavior, dependencies, move |deps, completion| {
            let handle = match tokio::runtime::Handle::try_current() {
                Ok(handle) => handle,
                Err(err) => {
                    error!(key = %completion.key(), "async factory requested outside a tokio runtime");
                    completion.fail(anyhow::Error::new(err));
                    return;
                }
            };
            let factory = factory.clone();
            debug!(key = %completion.key(), "spawning async build");
            handle.spawn(async move {
                match factory.create(deps).await {
                    Ok(value) => completion.resolve(value),
                    Err(err) => completion.fail(err),
                }
            });
        });
        descriptor.set_kind(crate::DescriptorKind::Factory, std::any::type_name::<T>());
        descriptor
    }
}
