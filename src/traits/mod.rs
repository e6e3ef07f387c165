//! Core traits for the resolution engine.

mod dispose;
mod resolver;

pub use dispose::OnScopeDestroy;
pub use resolver::{Resolver, ResolverCore};
