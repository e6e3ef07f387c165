//! Internal implementation details.

/// Hash map used for caches and registries.
#[cfg(feature = "ahash")]
pub(crate) type Map<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type Map<K, V> = std::collections::HashMap<K, V>;

/// Waiter queue; almost always holds a single entry.
#[cfg(feature = "smallvec")]
pub(crate) type Queue<T> = smallvec::SmallVec<[T; 1]>;
#[cfg(not(feature = "smallvec"))]
pub(crate) type Queue<T> = Vec<T>;

pub(crate) fn new_map<K, V>() -> Map<K, V> {
    Map::default()
}

pub(crate) fn map_with_capacity<K, V>(capacity: usize) -> Map<K, V> {
    Map::with_capacity_and_hasher(capacity, Default::default())
}
