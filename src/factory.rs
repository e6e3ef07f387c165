//! Typed build closures.
//!
//! A [`Factory`] is any closure taking its dependencies as `Arc<T>` values
//! and returning an `anyhow::Result`. The closure's parameter count is known
//! statically, which lets descriptor creation reject dependency lists that are
//! too short before anything is resolved.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::resolution::Dependencies;

/// Build closure with statically known parameters.
///
/// Implemented for `Fn(Arc<A>, Arc<B>, ...) -> anyhow::Result<T>` closures of
/// up to eight parameters. Parameter `i` is taken from the resolved dependency
/// at index `i`.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Behavior, Key, ServiceDescriptor};
/// use std::sync::Arc;
///
/// let descriptor = ServiceDescriptor::factory(
///     Key::name("greeting"),
///     Behavior::Prototype,
///     [Key::name("name")],
///     |name: Arc<String>| anyhow::Ok(format!("hello {name}")),
/// )
/// .unwrap();
/// assert_eq!(descriptor.dependencies().len(), 1);
///
/// // Too few dependencies for a two-parameter closure.
/// let err = ServiceDescriptor::factory(
///     Key::name("pair"),
///     Behavior::Prototype,
///     [Key::name("a")],
///     |a: Arc<u8>, b: Arc<u8>| anyhow::Ok(*a + *b),
/// )
/// .unwrap_err();
/// assert!(err.to_string().contains("requires 2 dependencies"));
/// ```
pub trait Factory<Args>: Send + Sync + 'static {
    /// The built value.
    type Output: Send + Sync + 'static;

    /// Number of dependencies the closure consumes.
    const ARITY: usize;

    /// Runs the closure over resolved dependencies.
    fn call(&self, deps: &Dependencies) -> DiResult<Self::Output>;
}

macro_rules! all_the_tuples {
    ($name:ident) => {
        $name!(0;);
        $name!(1; A1 0);
        $name!(2; A1 0, A2 1);
        $name!(3; A1 0, A2 1, A3 2);
        $name!(4; A1 0, A2 1, A3 2, A4 3);
        $name!(5; A1 0, A2 1, A3 2, A4 3, A5 4);
        $name!(6; A1 0, A2 1, A3 2, A4 3, A5 4, A6 5);
        $name!(7; A1 0, A2 1, A3 2, A4 3, A5 4, A6 5, A7 6);
        $name!(8; A1 0, A2 1, A3 2, A4 3, A5 4, A6 5, A7 6, A8 7);
    };
}

macro_rules! impl_factory {
    ($arity:expr; $($ty:ident $idx:tt),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, R, $($ty,)*> Factory<($($ty,)*)> for F
        where
            F: Fn($(Arc<$ty>),*) -> anyhow::Result<R> + Send + Sync + 'static,
            R: Send + Sync + 'static,
            $( $ty: Send + Sync + 'static, )*
        {
            type Output = R;

            const ARITY: usize = $arity;

            fn call(&self, deps: &Dependencies) -> DiResult<R> {
                $( let $ty = deps.get::<$ty>($idx)?; )*
                self($($ty),*).map_err(|err| DiError::build(deps.owner().clone(), err))
            }
        }
    };
}

all_the_tuples!(impl_factory);

/// Checks that `F` can be fed from `declared` dependencies.
pub(crate) fn check_arity<Args, F: Factory<Args>>(key: &crate::Key, declared: usize) -> DiResult<()> {
    if F::ARITY > declared {
        return Err(DiError::ArityMismatch {
            key: key.clone(),
            required: F::ARITY,
            declared,
        });
    }
    Ok(())
}
