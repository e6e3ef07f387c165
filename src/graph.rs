//! Graph preparation: turns a raw descriptor list into the validated,
//! `Inherited`-free set a provider runs on.
//!
//! The steps run in a fixed order:
//!
//! 1. deduplicate (last registration of a key wins, first position is kept)
//! 2. reject dependencies on unregistered keys (unless relaxed by config)
//! 3. reject dependency cycles
//! 4. resolve every `Inherited` behavior
//! 5. reject incompatible behavior pairs
//!
//! Every step is run once, before any service is built.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::behavior::Behavior;
use crate::config::EngineConfig;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::internal::{new_map, Map};
use crate::key::Key;

/// Runs every preparation step over `descriptors`.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::graph::prepare;
/// use ferrous_resolve::{Behavior, DiError, EngineConfig, Key, ServiceDescriptor};
///
/// let a = ServiceDescriptor::from_fn(Key::name("a"), Behavior::Singleton, [Key::name("b")], |_| anyhow::Ok(()));
/// let b = ServiceDescriptor::from_fn(Key::name("b"), Behavior::Singleton, [Key::name("a")], |_| anyhow::Ok(()));
///
/// let err = prepare(vec![a, b], &EngineConfig::default()).unwrap_err();
/// assert!(matches!(err, DiError::Circular { .. }));
/// ```
pub fn prepare(descriptors: Vec<ServiceDescriptor>, config: &EngineConfig) -> DiResult<Vec<ServiceDescriptor>> {
    let registered = descriptors.len();
    let descriptors = dedup(descriptors);
    if config.strict_dependencies {
        check_dependencies(&descriptors)?;
    }
    detect_cycles(&descriptors)?;
    let descriptors = propagate_behaviors(descriptors)?;
    validate_behaviors(&descriptors)?;

    info!(
        registered,
        services = descriptors.len(),
        inherited = descriptors.iter().filter(|d| d.origin().is_some()).count(),
        "service graph prepared"
    );
    Ok(descriptors)
}

/// Keeps one descriptor per key: the last one registered, at the position
/// of the first one.
pub fn dedup(descriptors: Vec<ServiceDescriptor>) -> Vec<ServiceDescriptor> {
    let mut positions: Map<Key, usize> = new_map();
    let mut out: Vec<ServiceDescriptor> = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        match positions.get(descriptor.key()) {
            Some(&position) => {
                debug!(key = %descriptor.key(), "descriptor replaced");
                out[position] = descriptor;
            }
            None => {
                positions.insert(descriptor.key().clone(), out.len());
                out.push(descriptor);
            }
        }
    }
    out
}

/// Fails on the first dependency whose key has no descriptor.
pub fn check_dependencies(descriptors: &[ServiceDescriptor]) -> DiResult<()> {
    let index = index_of(descriptors);
    for descriptor in descriptors {
        if let Some(missing) = descriptor.dependencies().iter().find(|dep| !index.contains_key(*dep)) {
            return Err(DiError::MissingDependency {
                service: descriptor.key().clone(),
                dependency: missing.clone(),
            });
        }
    }
    Ok(())
}

/// Fails with [`DiError::Circular`] when some descriptor can reach itself.
///
/// Each descriptor's dependency closure is walked breadth first, so the
/// reported path is a shortest cycle through that descriptor. Unregistered
/// keys are leaves.
pub fn detect_cycles(descriptors: &[ServiceDescriptor]) -> DiResult<()> {
    let index = index_of(descriptors);

    for descriptor in descriptors {
        let start = descriptor.key();
        let mut parent: Map<&Key, &Key> = new_map();
        let mut queue: VecDeque<&Key> = VecDeque::new();
        let mut current: &Key = start;
        let mut dependencies = descriptor.dependencies();

        loop {
            for dep in dependencies {
                if dep == start {
                    return Err(DiError::Circular {
                        key: start.clone(),
                        path: cycle_path(&parent, start, current),
                    });
                }
                if !parent.contains_key(dep) {
                    parent.insert(dep, current);
                    queue.push_back(dep);
                }
            }

            let next = loop {
                match queue.pop_front() {
                    Some(key) => {
                        if let Some(&i) = index.get(key) {
                            break Some((key, i));
                        }
                    }
                    None => break None,
                }
            };
            match next {
                Some((key, i)) => {
                    current = key;
                    dependencies = descriptors[i].dependencies();
                }
                None => break,
            }
        }
    }
    Ok(())
}

/// `start -> ... -> last -> start`, following parents back from `last`.
fn cycle_path(parent: &Map<&Key, &Key>, start: &Key, last: &Key) -> Vec<Key> {
    let mut path = vec![last.clone()];
    let mut cursor = last;
    while cursor != start {
        match parent.get(cursor) {
            Some(&up) => {
                path.push(up.clone());
                cursor = up;
            }
            None => break,
        }
    }
    path.reverse();
    path.push(start.clone());
    path
}

/// Replaces every `Inherited` behavior with `Scoped` or `Singleton`.
///
/// A descriptor becomes `Scoped` when any dependency requires a scope, and
/// `Singleton` otherwise. Inherited dependencies, and inherited services
/// reached through prototypes, are resolved first and count with their
/// resolved behavior. Resolved descriptors carry their original as
/// [`ServiceDescriptor::origin`].
///
/// Each service is visited once. A cycle through prototypes or inherited
/// services fails with [`DiError::Circular`]; other cycles are left to
/// [`detect_cycles`].
pub fn propagate_behaviors(mut descriptors: Vec<ServiceDescriptor>) -> DiResult<Vec<ServiceDescriptor>> {
    let index = owned_index_of(&descriptors);
    let mut needs = ScopeNeeds::new(&descriptors, &index, true);
    let mut resolved = Vec::new();
    for (i, descriptor) in descriptors.iter().enumerate() {
        if descriptor.behavior() == Behavior::Inherited {
            resolved.push((i, needs.of(i)?));
        }
    }

    for (i, scoped) in resolved {
        let behavior = if scoped { Behavior::Scoped } else { Behavior::Singleton };
        debug!(key = %descriptors[i].key(), %behavior, "inherited behavior resolved");
        descriptors[i] = descriptors[i].resolved_as(behavior);
    }
    Ok(descriptors)
}

#[derive(Clone, Copy)]
enum Visit {
    Unvisited,
    Visiting,
    Done(bool),
}

/// Memoised answer to "does resolving this service need an active scope".
///
/// Scoped services do, singletons don't, and prototypes do when any
/// dependency does. Inherited services count as scoped when any dependency
/// needs a scope if `resolve_inherited` is set, and as leaves otherwise.
/// Unregistered keys are leaves.
struct ScopeNeeds<'a> {
    descriptors: &'a [ServiceDescriptor],
    index: &'a Map<Key, usize>,
    resolve_inherited: bool,
    visits: Vec<Visit>,
    stack: Vec<usize>,
}

impl<'a> ScopeNeeds<'a> {
    fn new(descriptors: &'a [ServiceDescriptor], index: &'a Map<Key, usize>, resolve_inherited: bool) -> Self {
        Self {
            descriptors,
            index,
            resolve_inherited,
            visits: vec![Visit::Unvisited; descriptors.len()],
            stack: Vec::new(),
        }
    }

    fn of_key(&mut self, key: &Key) -> DiResult<bool> {
        let index = self.index;
        match index.get(key) {
            Some(&i) => self.of(i),
            None => Ok(false),
        }
    }

    fn of(&mut self, i: usize) -> DiResult<bool> {
        let descriptors = self.descriptors;
        let descends = match descriptors[i].behavior() {
            Behavior::Scoped => return Ok(true),
            Behavior::Singleton => return Ok(false),
            Behavior::Prototype => true,
            Behavior::Inherited => self.resolve_inherited,
        };
        if !descends {
            return Ok(false);
        }

        match self.visits[i] {
            Visit::Done(needs) => return Ok(needs),
            Visit::Visiting => return Err(self.cycle_to(i)),
            Visit::Unvisited => {}
        }

        self.visits[i] = Visit::Visiting;
        self.stack.push(i);
        let mut needs = false;
        for dep in descriptors[i].dependencies() {
            // Keep walking after a hit so cycles below are still reported.
            needs |= self.of_key(dep)?;
        }
        self.stack.pop();
        self.visits[i] = Visit::Done(needs);
        Ok(needs)
    }

    /// `i -> ... -> i` from the current walk.
    fn cycle_to(&self, i: usize) -> DiError {
        let from = self.stack.iter().position(|&j| j == i).unwrap_or(0);
        let mut path: Vec<Key> = self.stack[from..]
            .iter()
            .map(|&j| self.descriptors[j].key().clone())
            .collect();
        let key = self.descriptors[i].key().clone();
        path.push(key.clone());
        DiError::Circular { key, path }
    }
}

/// Checks every direct dependency edge.
///
/// A singleton may not depend on anything that requires a scope, and no
/// dependency may still be `Inherited`. Scoped services may depend on
/// singletons, and prototypes on anything.
///
/// Scope requirements are computed once per service. A cycle through
/// prototypes fails with [`DiError::Circular`].
pub fn validate_behaviors(descriptors: &[ServiceDescriptor]) -> DiResult<()> {
    let index = owned_index_of(descriptors);
    let mut needs = ScopeNeeds::new(descriptors, &index, false);
    for descriptor in descriptors {
        for dep in descriptor.dependencies() {
            let Some(&j) = index.get(dep) else {
                continue;
            };
            let dependency = &descriptors[j];
            if dependency.behavior() == Behavior::Inherited {
                return Err(DiError::UnresolvedInheritance {
                    service: descriptor.key().clone(),
                    dependency: dep.clone(),
                });
            }
            if descriptor.behavior() == Behavior::Singleton && needs.of(j)? {
                return Err(DiError::IncompatibleBehavior {
                    service: descriptor.key().clone(),
                    service_behavior: descriptor.behavior(),
                    dependency: dep.clone(),
                    dependency_behavior: dependency.behavior(),
                });
            }
        }
    }
    Ok(())
}

fn index_of(descriptors: &[ServiceDescriptor]) -> Map<&Key, usize> {
    let mut index = new_map();
    for (i, descriptor) in descriptors.iter().enumerate() {
        index.insert(descriptor.key(), i);
    }
    index
}

fn owned_index_of(descriptors: &[ServiceDescriptor]) -> Map<Key, usize> {
    let mut index = new_map();
    for (i, descriptor) in descriptors.iter().enumerate() {
        index.insert(descriptor.key().clone(), i);
    }
    index
}
