//! Callback share: collapses concurrent requests for the same pending key
//! into a single producer invocation.

use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::internal::{new_map, Map, Queue};

type Waiter<V> = Box<dyn FnOnce(V) + Send>;
type Pending<K, V> = Arc<Mutex<Map<K, Queue<Waiter<V>>>>>;

/// Dedup primitive for callback-style producers.
///
/// For a given key at most one producer runs per *pending window*: the
/// window opens when the first waiter registers and closes when the producer
/// settles. Waiters registered during the window are queued and notified in
/// registration order with clones of the settled value.
///
/// No lock is held while producers or waiters run, so both may call back into
/// the share (or into whatever owns it).
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::CallbackShare;
/// use std::sync::{Arc, Mutex};
///
/// let share: CallbackShare<&'static str, u32> = CallbackShare::new();
/// let parked = Arc::new(Mutex::new(None));
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// for i in 0..3 {
///     let parked = parked.clone();
///     let seen = seen.clone();
///     share.share(
///         "answer",
///         move |settle| *parked.lock().unwrap() = Some(settle),
///         move |value| seen.lock().unwrap().push((i, value)),
///     );
/// }
///
/// assert!(share.is_pending(&"answer"));
/// parked.lock().unwrap().take().unwrap().settle(42);
/// assert_eq!(*seen.lock().unwrap(), vec![(0, 42), (1, 42), (2, 42)]);
/// assert!(!share.is_pending(&"answer"));
/// ```
pub struct CallbackShare<K, V> {
    pending: Pending<K, V>,
}

impl<K, V> CallbackShare<K, V>
where
    K: Hash + Eq + Clone + Send + std::fmt::Debug + 'static,
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(new_map())),
        }
    }

    /// Registers `waiter` for `key`, invoking `producer` only if no producer is
    /// pending for that key.
    pub fn share<P, W>(&self, key: K, producer: P, waiter: W)
    where
        P: FnOnce(Settle<K, V>),
        W: FnOnce(V) + Send + 'static,
    {
        {
            let mut pending = self.pending.lock();
            if let Some(queue) = pending.get_mut(&key) {
                queue.push(Box::new(waiter));
                trace!(?key, waiting = queue.len(), "joined pending producer");
                return;
            }
            let mut queue = Queue::new();
            queue.push(Box::new(waiter) as Waiter<V>);
            pending.insert(key.clone(), queue);
        }

        producer(Settle {
            pending: self.pending.clone(),
            key,
            settled: false,
        });
    }

    /// Whether a producer is currently pending for `key`.
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Number of waiters queued on `key`.
    pub fn waiting(&self, key: &K) -> usize {
        self.pending.lock().get(key).map_or(0, |queue| queue.len())
    }

    /// Number of keys with a pending producer.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<K, V> Default for CallbackShare<K, V>
where
    K: Hash + Eq + Clone + Send + std::fmt::Debug + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for CallbackShare<K, V> {
    fn clone(&self) -> Self {
        Self {
            pending: self.pending.clone(),
        }
    }
}

/// Handle given to a producer; settling it closes the pending window.
///
/// Dropping an unsettled handle also closes the window. The queued waiters
/// are dropped without being invoked.
pub struct Settle<K: Hash + Eq, V> {
    pending: Pending<K, V>,
    key: K,
    settled: bool,
}

impl<K: Hash + Eq, V: Clone> Settle<K, V> {
    /// The key this producer runs for.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Forgets the key and notifies every registered waiter in order.
    pub fn settle(mut self, value: V) {
        self.settled = true;
        let waiters = self.pending.lock().remove(&self.key).unwrap_or_default();
        for waiter in waiters {
            waiter(value.clone());
        }
    }
}

impl<K: Hash + Eq, V> Drop for Settle<K, V> {
    fn drop(&mut self) {
        if !self.settled {
            // Release the lock before the waiters run their own drop glue.
            let waiters = self.pending.lock().remove(&self.key);
            drop(waiters);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn synchronous_producer_settles_inside_share() {
        let share: CallbackShare<u8, u8> = CallbackShare::new();
        let got = Arc::new(Mutex::new(None));
        let sink = got.clone();
        share.share(1, |settle| settle.settle(9), move |v| *sink.lock() = Some(v));
        assert_eq!(*got.lock(), Some(9));
        assert_eq!(share.pending_len(), 0);
    }

    #[test]
    fn one_producer_per_window() {
        let share: CallbackShare<u8, u8> = CallbackShare::new();
        let produced = Arc::new(AtomicUsize::new(0));
        let parked: Arc<Mutex<Vec<Settle<u8, u8>>>> = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..4 {
            let produced = produced.clone();
            let parked = parked.clone();
            share.share(
                7,
                move |settle| {
                    produced.fetch_add(1, Ordering::SeqCst);
                    parked.lock().push(settle);
                },
                |_| {},
            );
        }
        assert_eq!(produced.load(Ordering::SeqCst), 1);
        assert_eq!(share.waiting(&7), 4);

        let settle = parked.lock().pop().unwrap();
        settle.settle(1);

        // A new window opens after settling.
        let parked2 = parked.clone();
        share.share(7, move |settle| parked2.lock().push(settle), |_| {});
        assert_eq!(parked.lock().len(), 1);
    }

    #[test]
    fn waiters_may_reenter_the_share() {
        let share: CallbackShare<u8, u8> = CallbackShare::new();
        let inner = share.clone();
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = got.clone();
        share.share(
            1,
            |settle| settle.settle(1),
            move |v| {
                let sink2 = sink.clone();
                sink.lock().push(v);
                inner.share(1, |settle| settle.settle(2), move |v| sink2.lock().push(v));
            },
        );
        assert_eq!(*got.lock(), vec![1, 2]);
    }

    #[test]
    fn dropping_settle_closes_the_window() {
        let share: CallbackShare<u8, u8> = CallbackShare::new();
        share.share(3, drop, |_| panic!("waiter must not run"));
        assert!(!share.is_pending(&3));
    }
}
