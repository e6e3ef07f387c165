//! Values flowing through a resolution: erased instances, resolved
//! dependency lists and one-shot completions.

use std::any::Any;
use std::sync::Arc;

use tracing::trace;

use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Type-erased shared instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Callback receiving the outcome of a resolution.
pub type Callback = Box<dyn FnOnce(DiResult<AnyArc>) + Send>;

/// Downcasts an erased instance.
pub fn downcast<T: Send + Sync + 'static>(key: &Key, value: AnyArc) -> DiResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| DiError::TypeMismatch {
        key: key.clone(),
        expected: std::any::type_name::<T>(),
    })
}

/// Downcasts an instance stored as `Arc<Arc<dyn Trait>>`.
pub fn downcast_trait<T: ?Sized + Send + Sync + 'static>(key: &Key, value: AnyArc) -> DiResult<Arc<T>> {
    value
        .downcast::<Arc<T>>()
        .map(|outer| (*outer).clone())
        .map_err(|_| DiError::TypeMismatch {
            key: key.clone(),
            expected: std::any::type_name::<Arc<T>>(),
        })
}

/// One-shot handle through which a build function delivers its result.
///
/// A completion may be used synchronously, inside the build function, or kept
/// and completed later. It can only be completed once since every completing
/// method consumes it. Dropping it without completing delivers
/// [`DiError::Abandoned`] so that waiters are never left hanging.
pub struct Completion {
    key: Key,
    callback: Option<Callback>,
}

impl Completion {
    pub(crate) fn new(key: Key, callback: Callback) -> Self {
        Self {
            key,
            callback: Some(callback),
        }
    }

    /// The key being built.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Delivers a result.
    pub fn complete(mut self, result: DiResult<AnyArc>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }

    /// Delivers a freshly built value.
    pub fn resolve<T: Send + Sync + 'static>(self, value: T) {
        self.complete(Ok(Arc::new(value)));
    }

    /// Delivers a build failure.
    pub fn fail(self, reason: anyhow::Error) {
        let err = DiError::build(self.key.clone(), reason);
        self.complete(Err(err));
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            trace!(key = %self.key, "completion dropped without a result");
            callback(Err(DiError::Abandoned(self.key.clone())));
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("key", &self.key)
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// Resolved dependencies of a build, in declaration order.
#[derive(Clone)]
pub struct Dependencies {
    owner: Key,
    keys: Arc<[Key]>,
    values: Vec<AnyArc>,
}

impl Dependencies {
    pub(crate) fn new(owner: Key, keys: Arc<[Key]>, values: Vec<AnyArc>) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        Self { owner, keys, values }
    }

    /// Key of the service these dependencies are built for.
    pub fn owner(&self) -> &Key {
        &self.owner
    }

    /// Number of resolved dependencies.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Key declared at `index`.
    pub fn key(&self, index: usize) -> Option<&Key> {
        self.keys.get(index)
    }

    /// Declared keys.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Erased value at `index`.
    pub fn get_any(&self, index: usize) -> DiResult<AnyArc> {
        match self.values.get(index) {
            Some(value) => Ok(value.clone()),
            None => Err(DiError::ArityMismatch {
                key: self.owner.clone(),
                required: index + 1,
                declared: self.values.len(),
            }),
        }
    }

    /// Typed value at `index`.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        let value = self.get_any(index)?;
        downcast::<T>(&self.keys[index], value)
    }

    /// Trait object at `index`, stored as `Arc<Arc<dyn Trait>>`.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        let value = self.get_any(index)?;
        downcast_trait::<T>(&self.keys[index], value)
    }

    /// Replaces the value at `index`.
    pub(crate) fn replace(&mut self, index: usize, value: AnyArc) {
        self.values[index] = value;
    }

    /// Erased values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &AnyArc)> {
        self.keys.iter().zip(self.values.iter())
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.keys.iter()).finish()
    }
}
