//! Service key types for the resolution engine.

use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// Key for descriptor storage and lookup.
///
/// A key is an opaque identity for a requested capability. It carries no
/// behavior; descriptors and dependency lists are written in terms of keys.
///
/// # Key Types
///
/// - **Type**: a concrete type (the "class reference" case)
/// - **Trait**: an abstract/interface marker such as `dyn Logger`
/// - **Name**: a string name, equal to any other name with the same text
/// - **Symbol**: a unique symbol; two symbols are only equal to themselves
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Key, key_of_type, key_of_trait};
///
/// trait Logger: Send + Sync {}
///
/// let a = key_of_type::<String>();
/// let b = key_of_type::<String>();
/// assert_eq!(a, b);
///
/// assert_eq!(Key::name("db"), Key::name("db"));
/// assert_ne!(Key::symbol("db"), Key::symbol("db"));
///
/// let logger = key_of_trait::<dyn Logger>();
/// assert!(logger.display_name().contains("Logger"));
/// ```
#[derive(Debug, Clone)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    ///
    /// The TypeId drives equality and hashing; the name is only used for
    /// display.
    Type(TypeId, &'static str),
    /// Abstract/interface marker.
    ///
    /// Only stores the trait name since unsized trait objects are looked up
    /// by name.
    Trait(&'static str),
    /// String name
    Name(Arc<str>),
    /// Unique symbol with a description for diagnostics
    Symbol(u64, &'static str),
}

impl Key {
    /// Creates a string-named key.
    pub fn name(name: impl AsRef<str>) -> Self {
        Key::Name(Arc::from(name.as_ref()))
    }

    /// Creates a fresh symbol.
    ///
    /// Every call returns a key that is distinct from every other key,
    /// whatever the description says.
    pub fn symbol(description: &'static str) -> Self {
        Key::Symbol(NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed), description)
    }

    /// Get the type name, trait name, string name or symbol description
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_resolve::Key;
    /// use std::any::TypeId;
    ///
    /// let type_key = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    /// assert_eq!(type_key.display_name(), "alloc::string::String");
    ///
    /// assert_eq!(Key::name("request").display_name(), "request");
    /// assert_eq!(Key::symbol("token").display_name(), "token");
    /// ```
    pub fn display_name(&self) -> &str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(name) => name,
            Key::Name(name) => name,
            Key::Symbol(_, description) => description,
        }
    }

    /// Returns the TypeId for `Type` keys.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Key::Type(id, _) => Some(*id),
            _ => None,
        }
    }
}

impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // TypeId comparison only, the name is diagnostic
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Trait(a), Key::Trait(b)) => a == b,
            (Key::Name(a), Key::Name(b)) => a == b,
            (Key::Symbol(a, _), Key::Symbol(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Trait(name) => {
                1u8.hash(state);
                name.hash(state);
            }
            Key::Name(name) => {
                2u8.hash(state);
                name.hash(state);
            }
            Key::Symbol(id, _) => {
                3u8.hash(state);
                id.hash(state);
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Type(_, name) => write!(f, "type:{}", name),
            Key::Trait(name) => write!(f, "trait:{}", name),
            Key::Name(name) => write!(f, "name:{}", name),
            Key::Symbol(id, description) => write!(f, "symbol:{}#{}", description, id),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::name(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(Arc::from(name))
    }
}

/// Key for a concrete type.
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Key for an abstract/interface marker such as `dyn Logger`.
#[inline(always)]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(std::any::type_name::<T>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn type_keys_ignore_the_display_name() {
        let a = Key::Type(TypeId::of::<u32>(), "u32");
        let b = Key::Type(TypeId::of::<u32>(), "renamed");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn variants_never_compare_equal() {
        assert_ne!(Key::name("u32"), key_of_type::<u32>());
        assert_ne!(Key::Trait("x"), Key::name("x"));
    }

    #[test]
    fn display_is_prefixed_per_variant() {
        assert_eq!(Key::name("db").to_string(), "name:db");
        assert_eq!(key_of_type::<u8>().to_string(), "type:u8");
        assert!(Key::symbol("tok").to_string().starts_with("symbol:tok#"));
    }
}
