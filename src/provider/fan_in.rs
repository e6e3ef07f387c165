//! Dependency fan-out and fan-in.
//!
//! Every dependency request is issued before any result is looked at. Results
//! are collected into index-ordered slots; the first failure to arrive fails
//! the whole set and later results are discarded.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::resolution::AnyArc;
use crate::traits::ResolverCore;

type Done = Box<dyn FnOnce(DiResult<Vec<AnyArc>>) + Send>;

struct FanIn {
    slots: Vec<Option<AnyArc>>,
    remaining: usize,
    sealed: bool,
    error: Option<DiError>,
    done: Option<Done>,
}

impl FanIn {
    /// The outcome, once all requests were issued and it is known.
    fn take_finished(&mut self) -> Option<(Done, DiResult<Vec<AnyArc>>)> {
        if !self.sealed {
            return None;
        }
        if let Some(err) = &self.error {
            let err = err.clone();
            return self.done.take().map(|done| (done, Err(err)));
        }
        if self.remaining == 0 {
            let done = self.done.take()?;
            let values = self.slots.drain(..).flatten().collect();
            return Some((done, Ok(values)));
        }
        None
    }
}

/// Resolves `keys` through `resolver` and hands the values to `done` in key
/// order.
///
/// `done` runs at most once, outside any lock. If some dependency never
/// delivers, `done` is dropped without running.
pub(crate) fn resolve_all<F>(resolver: &dyn ResolverCore, keys: &[Key], done: F)
where
    F: FnOnce(DiResult<Vec<AnyArc>>) + Send + 'static,
{
    if keys.is_empty() {
        done(Ok(Vec::new()));
        return;
    }

    let state = Arc::new(Mutex::new(FanIn {
        slots: vec![None; keys.len()],
        remaining: keys.len(),
        sealed: false,
        error: None,
        done: Some(Box::new(done)),
    }));

    for (index, key) in keys.iter().enumerate() {
        let slot = state.clone();
        let issued = resolver.provide(key, Box::new(move |result| arrive(&slot, index, result)));
        if let Err(err) = issued {
            arrive(&state, index, Err(err));
        }
    }

    let finished = {
        let mut guard = state.lock();
        guard.sealed = true;
        guard.take_finished()
    };
    if let Some((done, result)) = finished {
        done(result);
    }
}

fn arrive(state: &Mutex<FanIn>, index: usize, result: DiResult<AnyArc>) {
    let finished = {
        let mut guard = state.lock();
        match result {
            Ok(value) => {
                if guard.done.is_some() && guard.slots[index].is_none() {
                    guard.slots[index] = Some(value);
                    guard.remaining -= 1;
                }
            }
            Err(err) => {
                if guard.error.is_none() {
                    guard.error = Some(err);
                }
            }
        }
        guard.take_finished()
    };
    if let Some((done, result)) = finished {
        done(result);
    }
}
