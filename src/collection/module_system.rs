//! Service modules: reusable groups of registrations.

use crate::{DiResult, ServiceCollection};

/// A module that can register services with a ServiceCollection.
///
/// # Example
///
/// ```rust
/// use ferrous_resolve::{Behavior, DiResult, Key, Resolver, ServiceCollection, ServiceCollectionExt, ServiceModule};
/// use std::sync::Arc;
///
/// struct UserConfig { table: &'static str }
/// struct UserService { config: Arc<UserConfig> }
///
/// struct UserModule;
///
/// impl ServiceModule for UserModule {
///     fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
///         services.add_value(Key::name("user_config"), UserConfig { table: "users" });
///         services.add_factory(
///             Key::name("users"),
///             Behavior::Inherited,
///             [Key::name("user_config")],
///             |config: Arc<UserConfig>| anyhow::Ok(UserService { config }),
///         )?;
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let provider = ServiceCollection::new().add_module(UserModule)?.build()?;
/// let users = provider.get::<UserService>(&Key::name("users"))?;
/// assert_eq!(users.config.table, "users");
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule {
    /// Register this module's services with the ServiceCollection.
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()>;
}

/// Extension trait for chaining module registration by value.
pub trait ServiceCollectionExt {
    /// Add a module to the service collection.
    fn add_module<M: ServiceModule>(self, module: M) -> DiResult<Self>
    where
        Self: Sized;
}

impl ServiceCollectionExt for ServiceCollection {
    fn add_module<M: ServiceModule>(mut self, module: M) -> DiResult<Self> {
        module.register_services(&mut self)?;
        Ok(self)
    }
}

/// Extension trait for module registration through `&mut ServiceCollection`.
pub trait ServiceCollectionModuleExt {
    /// Add a module to the service collection in place.
    fn add_module_mut<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self>;
}

impl ServiceCollectionModuleExt for ServiceCollection {
    fn add_module_mut<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }
}
