//! Type metadata: dependency keys for types registered without an explicit
//! dependency list.
//!
//! Rust has no runtime reflection over constructor parameters, so parameters
//! are recorded explicitly in a [`TypeMetadata`] source (usually a
//! [`MetadataRegistry`]) and the type implements [`Injectable`] to build
//! itself from the resolved values.

use std::any::TypeId;
use std::sync::Arc;

use crate::behavior::Behavior;
use crate::descriptors::{DescriptorKind, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::internal::{new_map, Map};
use crate::key::{key_of_type, Key};
use crate::resolution::{downcast, AnyArc, Dependencies};

/// Transform applied to a resolved dependency before construction.
pub type Projection = Arc<dyn Fn(&Key, AnyArc) -> DiResult<AnyArc> + Send + Sync>;

/// A type that builds itself from resolved dependencies.
///
/// `PARAMETERS` is the number of dependencies [`inject`](Self::inject) reads.
pub trait Injectable: Sized + Send + Sync + 'static {
    const PARAMETERS: usize;

    fn inject(deps: &Dependencies) -> anyhow::Result<Self>;
}

/// Replacement for the default key of one parameter.
#[derive(Clone)]
pub struct ParameterBinding {
    pub key: Key,
    pub projection: Option<Projection>,
}

impl ParameterBinding {
    /// Resolves the parameter from `key` instead of its recorded default.
    pub fn new(key: Key) -> Self {
        Self { key, projection: None }
    }

    /// Resolves the parameter from `key` and maps the value with `f`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_resolve::{Key, ParameterBinding};
    ///
    /// #[derive(Debug)]
    /// struct Settings { port: u16 }
    ///
    /// let binding = ParameterBinding::projected(Key::name("settings"), |s: &Settings| s.port);
    /// assert_eq!(binding.key, Key::name("settings"));
    /// assert!(binding.projection.is_some());
    /// ```
    pub fn projected<S, T, F>(key: Key, f: F) -> Self
    where
        S: Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let projection: Projection = Arc::new(move |key, value| {
            let source = downcast::<S>(key, value)?;
            Ok(Arc::new(f(&source)) as AnyArc)
        });
        Self {
            key,
            projection: Some(projection),
        }
    }
}

impl std::fmt::Debug for ParameterBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterBinding")
            .field("key", &self.key)
            .field("projected", &self.projection.is_some())
            .finish()
    }
}

/// Source of parameter metadata keyed by (type, optional member name).
pub trait TypeMetadata: Send + Sync {
    /// Ordered parameter keys of `ty`'s constructor (`member == None`) or of
    /// one of its members.
    fn parameters(&self, ty: TypeId, member: Option<&str>) -> Option<Vec<Key>>;

    /// Override registered for one parameter.
    fn binding(&self, ty: TypeId, member: Option<&str>, index: usize) -> Option<ParameterBinding>;
}

type Target = (TypeId, Option<String>);

/// In-memory [`TypeMetadata`] source.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{
///     key_of_type, Behavior, Dependencies, Injectable, MetadataRegistry, Resolver,
///     ServiceCollection,
/// };
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Repo { config: Arc<Config> }
///
/// impl Injectable for Repo {
///     const PARAMETERS: usize = 1;
///     fn inject(deps: &Dependencies) -> anyhow::Result<Self> {
///         Ok(Repo { config: deps.get::<Config>(0)? })
///     }
/// }
///
/// let mut metadata = MetadataRegistry::new();
/// metadata.record::<Repo>([key_of_type::<Config>()]);
///
/// let mut services = ServiceCollection::new();
/// services.add_value(key_of_type::<Config>(), Config { url: "mem://".into() });
/// services.add_type::<Repo>(&metadata, Behavior::Singleton).unwrap();
///
/// let provider = services.build().unwrap();
/// let repo = provider.get::<Repo>(&key_of_type::<Repo>()).unwrap();
/// assert_eq!(repo.config.url, "mem://");
/// ```
#[derive(Default)]
pub struct MetadataRegistry {
    parameters: Map<Target, Vec<Key>>,
    bindings: Map<(Target, usize), ParameterBinding>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self {
            parameters: new_map(),
            bindings: new_map(),
        }
    }

    /// Records the constructor parameters of `T`.
    pub fn record<T: 'static>(&mut self, parameters: impl IntoIterator<Item = Key>) -> &mut Self {
        self.parameters
            .insert((TypeId::of::<T>(), None), parameters.into_iter().collect());
        self
    }

    /// Records the parameters of member `member` of `T`.
    pub fn record_member<T: 'static>(&mut self, member: &str, parameters: impl IntoIterator<Item = Key>) -> &mut Self {
        self.parameters
            .insert((TypeId::of::<T>(), Some(member.to_owned())), parameters.into_iter().collect());
        self
    }

    /// Overrides parameter `index` of `T`'s constructor or of one of its members.
    pub fn bind<T: 'static>(&mut self, member: Option<&str>, index: usize, binding: ParameterBinding) -> &mut Self {
        self.bindings
            .insert(((TypeId::of::<T>(), member.map(str::to_owned)), index), binding);
        self
    }
}

impl TypeMetadata for MetadataRegistry {
    fn parameters(&self, ty: TypeId, member: Option<&str>) -> Option<Vec<Key>> {
        self.parameters.get(&(ty, member.map(str::to_owned))).cloned()
    }

    fn binding(&self, ty: TypeId, member: Option<&str>, index: usize) -> Option<ParameterBinding> {
        self.bindings.get(&((ty, member.map(str::to_owned)), index)).cloned()
    }
}

/// Dependency keys and projections for one (type, member) target.
struct Plan {
    keys: Arc<[Key]>,
    projections: Vec<Option<Projection>>,
}

fn plan<T: 'static>(
    source: &dyn TypeMetadata,
    key: &Key,
    member: Option<&str>,
    required: usize,
) -> DiResult<Plan> {
    let ty = TypeId::of::<T>();
    let parameters = match source.parameters(ty, member) {
        Some(parameters) => parameters,
        // A member always needs recorded metadata.
        None if required == 0 && member.is_none() => Vec::new(),
        None => return Err(DiError::MissingMetadata(std::any::type_name::<T>())),
    };
    if parameters.len() < required {
        return Err(DiError::ArityMismatch {
            key: key.clone(),
            required,
            declared: parameters.len(),
        });
    }

    let mut keys = Vec::with_capacity(parameters.len());
    let mut projections = Vec::with_capacity(parameters.len());
    for (index, default) in parameters.into_iter().enumerate() {
        match source.binding(ty, member, index) {
            Some(binding) => {
                keys.push(binding.key);
                projections.push(binding.projection);
            }
            None => {
                keys.push(default);
                projections.push(None);
            }
        }
    }
    Ok(Plan {
        keys: keys.into(),
        projections,
    })
}

fn project(projections: &[Option<Projection>], mut deps: Dependencies) -> DiResult<Dependencies> {
    for (index, projection) in projections.iter().enumerate() {
        if let Some(projection) = projection {
            let value = deps.get_any(index)?;
            let key = deps.keys()[index].clone();
            deps.replace(index, projection(&key, value)?);
        }
    }
    Ok(deps)
}

impl ServiceDescriptor {
    /// Creates a descriptor for `T` keyed by `key_of_type::<T>()`, taking its
    /// dependency keys from `source`.
    ///
    /// Fails with [`DiError::MissingMetadata`] when `T` declares parameters
    /// but `source` has none recorded, and with [`DiError::ArityMismatch`]
    /// when fewer than `T::PARAMETERS` were recorded.
    pub fn from_type<T: Injectable>(source: &dyn TypeMetadata, behavior: Behavior) -> DiResult<Self> {
        let key = key_of_type::<T>();
        let Plan { keys, projections } = plan::<T>(source, &key, None, T::PARAMETERS)?;

        let mut descriptor = ServiceDescriptor::new(key, behavior, [], move |deps, completion| {
            match project(&projections, deps) {
                Ok(deps) => match T::inject(&deps) {
                    Ok(value) => completion.resolve(value),
                    Err(err) => completion.fail(err),
                },
                Err(err) => completion.complete(Err(err)),
            }
        });
        descriptor.set_dependencies(keys);
        descriptor.set_kind(DescriptorKind::Type, std::any::type_name::<T>());
        Ok(descriptor)
    }

    /// Creates a descriptor for a member of `T` (a factory method), taking its
    /// dependency keys from `source`.
    ///
    /// Members have no static parameter count, so missing metadata is always
    /// an error.
    pub fn from_member<T, R, F>(
        source: &dyn TypeMetadata,
        key: Key,
        member: &str,
        behavior: Behavior,
        f: F,
    ) -> DiResult<Self>
    where
        T: 'static,
        R: Send + Sync + 'static,
        F: Fn(&Dependencies) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let Plan { keys, projections } = plan::<T>(source, &key, Some(member), 0)?;

        let mut descriptor = ServiceDescriptor::new(key, behavior, [], move |deps, completion| {
            match project(&projections, deps) {
                Ok(deps) => match f(&deps) {
                    Ok(value) => completion.resolve(value),
                    Err(err) => completion.fail(err),
                },
                Err(err) => completion.complete(Err(err)),
            }
        });
        descriptor.set_dependencies(keys);
        descriptor.set_kind(DescriptorKind::Type, std::any::type_name::<R>());
        Ok(descriptor)
    }
}
