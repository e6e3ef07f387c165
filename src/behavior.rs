//! Lifetime behavior definitions.

use std::fmt;

/// Lifetime behavior controlling instance caching
///
/// # Behavior Characteristics
///
/// - **Singleton**: built once per root provider, shared by every scope
/// - **Scoped**: built once per scope, torn down with the scope
/// - **Prototype**: built on every request, never cached
/// - **Inherited**: placeholder, replaced by `Singleton` or `Scoped` during
///   graph preparation depending on what the service depends on
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{ServiceCollection, Behavior, Key, Resolver};
///
/// let mut services = ServiceCollection::new();
/// services.add_value(Key::name("url"), "postgres://localhost".to_string());
/// services.add_factory(Key::name("request"), Behavior::Scoped, [], || anyhow::Ok(7u32)).unwrap();
/// services
///     .add_factory(
///         Key::name("handler"),
///         Behavior::Inherited,
///         [Key::name("url"), Key::name("request")],
///         |url: std::sync::Arc<String>, id: std::sync::Arc<u32>| anyhow::Ok(format!("{url}#{id}")),
///     )
///     .unwrap();
///
/// let provider = services.build().unwrap();
/// let handler = provider.descriptor(&Key::name("handler")).unwrap();
/// assert_eq!(handler.behavior(), Behavior::Scoped);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum Behavior {
    /// Resolved during graph preparation, never seen by a provider
    ///
    /// A service with this behavior becomes `Scoped` when any of its
    /// dependencies needs a scope, and `Singleton` otherwise.
    Inherited,
    /// Single instance per root provider, cached forever
    ///
    /// Built on first request and shared by the root provider and every
    /// scope created from it. A singleton must never capture a scoped value.
    Singleton,
    /// New instance per resolution, never cached
    Prototype,
    /// Single instance per scope, cached for the scope lifetime
    ///
    /// Resolving a scoped service requires an active scope on the provider.
    Scoped,
}

impl Behavior {
    /// Returns `false` only for `Inherited`.
    pub fn is_concrete(self) -> bool {
        !matches!(self, Behavior::Inherited)
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Behavior::Inherited => "inherited",
            Behavior::Singleton => "singleton",
            Behavior::Prototype => "prototype",
            Behavior::Scoped => "scoped",
        };
        f.write_str(name)
    }
}
