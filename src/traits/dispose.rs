//! Teardown hook for scoped values.

/// Trait for values that need cleanup when their scope is destroyed.
///
/// The hook is fire and forget: it takes no arguments and its completion is
/// not awaited. Mark a descriptor with
/// [`with_teardown`](crate::ServiceDescriptor::with_teardown) to have the
/// hook run on its cached scoped values.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Behavior, Key, OnScopeDestroy, Resolver, ServiceCollection, ServiceDescriptor};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// static CLOSED: AtomicBool = AtomicBool::new(false);
///
/// struct Transaction;
///
/// impl OnScopeDestroy for Transaction {
///     fn on_scope_destroy(&self) {
///         CLOSED.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add(
///     ServiceDescriptor::factory(Key::name("tx"), Behavior::Scoped, [], || anyhow::Ok(Transaction))
///         .unwrap()
///         .with_teardown::<Transaction>(),
/// );
///
/// let provider = services.build().unwrap();
/// let scoped = provider.create_scope(|_| {}).unwrap();
/// scoped.get::<Transaction>(&Key::name("tx")).unwrap();
/// scoped.destroy_scope().unwrap();
/// assert!(CLOSED.load(Ordering::SeqCst));
/// ```
pub trait OnScopeDestroy: Send + Sync + 'static {
    /// Perform cleanup of resources.
    fn on_scope_destroy(&self);
}
