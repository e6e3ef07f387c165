//! Resolution strategies, one per concrete behavior.
//!
//! The strategy of a registration is picked once when the provider is built,
//! so the resolving path never matches on the behavior again.

use std::sync::Arc;

use tracing::{debug, error};

use crate::behavior::Behavior;
use crate::error::{DiError, DiResult};
use crate::registration::Registration;
use crate::resolution::Callback;

use super::ServiceProvider;

/// How a registration turns a request into a value.
pub(crate) trait ResolveStrategy: Send + Sync {
    fn provide(&self, provider: &ServiceProvider, registration: &Arc<Registration>, callback: Callback) -> DiResult<()>;
}

/// Builds on every request.
pub(crate) struct PrototypeStrategy;

/// Builds once per root provider, shared by every scope.
pub(crate) struct SingletonStrategy;

/// Builds once per scope.
pub(crate) struct ScopedStrategy;

static PROTOTYPE: PrototypeStrategy = PrototypeStrategy;
static SINGLETON: SingletonStrategy = SingletonStrategy;
static SCOPED: ScopedStrategy = ScopedStrategy;

/// Strategy for a prepared behavior.
pub(crate) fn strategy_for(behavior: Behavior) -> &'static dyn ResolveStrategy {
    match behavior {
        Behavior::Prototype => &PROTOTYPE,
        Behavior::Scoped => &SCOPED,
        // Inherited never survives preparation.
        Behavior::Singleton | Behavior::Inherited => &SINGLETON,
    }
}

impl ResolveStrategy for PrototypeStrategy {
    fn provide(&self, provider: &ServiceProvider, registration: &Arc<Registration>, callback: Callback) -> DiResult<()> {
        provider.build(registration, callback);
        Ok(())
    }
}

impl ResolveStrategy for SingletonStrategy {
    fn provide(&self, provider: &ServiceProvider, registration: &Arc<Registration>, callback: Callback) -> DiResult<()> {
        let key = registration.key();
        let cached = provider.inner().singletons.lock().get(key).cloned();
        if let Some(value) = cached {
            debug!(%key, "singleton cache hit");
            callback(Ok(value));
            return Ok(());
        }

        // Singletons never see the scope of the provider they were requested from.
        let root = provider.root();
        let registration = registration.clone();
        provider.inner().singleton_share.share(
            key.clone(),
            move |settle| {
                // Another request may have filled the cache since the check above.
                let cached = root.inner().singletons.lock().get(settle.key()).cloned();
                if let Some(value) = cached {
                    settle.settle(Ok(value));
                    return;
                }
                debug!(key = %settle.key(), "singleton cache miss");
                let cache = root.clone();
                root.build(
                    &registration,
                    Box::new(move |result| {
                        if let Ok(value) = &result {
                            cache.inner().singletons.lock().insert(settle.key().clone(), value.clone());
                        }
                        settle.settle(result);
                    }),
                );
            },
            callback,
        );
        Ok(())
    }
}

impl ResolveStrategy for ScopedStrategy {
    fn provide(&self, provider: &ServiceProvider, registration: &Arc<Registration>, callback: Callback) -> DiResult<()> {
        let key = registration.key();
        let Some(scope) = provider.scope() else {
            error!(%key, "scoped service requested without a scope");
            return Err(DiError::ScopeNotDefined(key.clone()));
        };

        let builder = provider.clone();
        let target = registration.clone();
        scope.get(
            key,
            registration.descriptor.teardown(),
            move |callback| builder.build(&target, callback),
            callback,
        );
        Ok(())
    }
}
