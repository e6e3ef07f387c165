//! Service registration types.

use std::sync::Arc;

use crate::descriptors::ServiceDescriptor;
use crate::internal::{new_map, Map};
use crate::key::Key;
use crate::provider::strategy::{strategy_for, ResolveStrategy};

/// Prepared descriptor bound to the strategy that resolves it.
pub(crate) struct Registration {
    pub(crate) descriptor: Arc<ServiceDescriptor>,
    pub(crate) strategy: &'static dyn ResolveStrategy,
}

impl Registration {
    pub(crate) fn new(descriptor: ServiceDescriptor) -> Self {
        let strategy = strategy_for(descriptor.behavior());
        Self {
            descriptor: Arc::new(descriptor),
            strategy,
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> &Key {
        self.descriptor.key()
    }
}

/// Service registry holding all registrations of a provider.
///
/// Built once from a prepared descriptor list and never mutated afterwards.
pub(crate) struct Registry {
    entries: Map<Key, Arc<Registration>>,
    /// Keys in preparation order
    order: Vec<Key>,
    scoped_count: usize,
}

impl Registry {
    /// Builds the registry from prepared descriptors (one per key).
    pub(crate) fn from_prepared(descriptors: Vec<ServiceDescriptor>) -> Self {
        let mut entries = new_map();
        let mut order = Vec::with_capacity(descriptors.len());
        let mut scoped_count = 0;
        for descriptor in descriptors {
            if descriptor.behavior() == crate::Behavior::Scoped {
                scoped_count += 1;
            }
            let registration = Registration::new(descriptor);
            order.push(registration.key().clone());
            entries.insert(registration.key().clone(), Arc::new(registration));
        }
        Self {
            entries,
            order,
            scoped_count,
        }
    }

    #[inline(always)]
    pub(crate) fn get(&self, key: &Key) -> Option<&Arc<Registration>> {
        self.entries.get(key)
    }

    #[inline(always)]
    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Registrations in preparation order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.order.iter().filter_map(|key| self.entries.get(key))
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn scoped_count(&self) -> usize {
        self.scoped_count
    }
}
