mod factory_implementation;
mod raw_wrapper;
mod wrapper;

use std::any;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::container::injector::{Injector, ResolveError};
use crate::container::registry::ConfigError;
use crate::container::Managed;
use crate::key::Key;
use crate::provider::{Activator, Arguments, BoxError};

pub use raw_wrapper::RawFactoryActivator;
pub use wrapper::FactoryActivator;

/// An asynchronous [`Fn`] whose arguments are resolved before it is called.
///
/// Closures of `Fn(A1, A2, ...) -> impl Future<Output = Result<T, E>>`
/// where `Ai: Managed + Clone` are [`Factory`]. Each argument is looked up
/// without a qualifier.
///
/// Usually you don't need to use a [`Factory`] directly. The most
/// recommended way is to use `to_factory()` [`dsl`]s offered by this crate.
///
/// [`Factory`] is only implemented for closures whose arity is at most 12.
///
/// [`dsl`]: crate::module::dsl
pub trait Factory<D>
where
    Self: Send + Sync + 'static,
    D: Send + Sync + 'static,
{
    type Constructed: Managed;

    type Error: Into<BoxError>;

    fn dependencies() -> Vec<Box<dyn Key>>;

    /// Takes the dependencies out of `arguments` and starts the closure.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument does not have the expected type.
    fn start(
        &self,
        arguments: &Arguments,
    ) -> Result<BoxFuture<'static, Result<Self::Constructed, Self::Error>>, ResolveError>;
}

/// An asynchronous [`Fn`] which receives an [`Injector`] and resolves what
/// it needs by itself.
pub trait RawFactory
where
    Self: Send + Sync + 'static,
{
    type Constructed: Managed;

    type Error: Into<BoxError>;

    type Future: Future<Output = Result<Self::Constructed, Self::Error>> + Send + 'static;

    fn produce(&self, injector: Injector) -> Self::Future;
}

impl<F, Fut, T, E> RawFactory for F
where
    F: Fn(Injector) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Managed,
    E: Into<BoxError>,
{
    type Constructed = T;

    type Error = E;

    type Future = Fut;

    fn produce(&self, injector: Injector) -> Self::Future {
        self(injector)
    }
}

type BuildActivator = dyn Fn() -> Result<Arc<dyn Activator>, ConfigError> + Send + Sync;

/// A factory, erased for the configuration tree.
#[derive(Clone)]
pub struct FactoryDescriptor {
    constructed: &'static str,
    activator: Arc<BuildActivator>,
}

impl FactoryDescriptor {
    pub fn from_factory<F, D>(factory: F) -> Self
    where
        F: Factory<D>,
        D: Send + Sync + 'static,
    {
        let factory = Arc::new(factory);
        Self {
            constructed: any::type_name::<F::Constructed>(),
            activator: Arc::new(move || {
                let activator = FactoryActivator::new(Arc::clone(&factory))?;
                Ok(Arc::new(activator) as Arc<dyn Activator>)
            }),
        }
    }

    pub fn from_raw<F: RawFactory>(factory: F) -> Self {
        let factory = Arc::new(factory);
        Self {
            constructed: any::type_name::<F::Constructed>(),
            activator: Arc::new(move || {
                let activator = RawFactoryActivator::new(Arc::clone(&factory));
                Ok(Arc::new(activator) as Arc<dyn Activator>)
            }),
        }
    }

    /// The name of the type the factory produces.
    pub fn constructed(&self) -> &'static str {
        self.constructed
    }

    pub fn activator(&self) -> Result<Arc<dyn Activator>, ConfigError> {
        (self.activator)()
    }
}

impl Debug for FactoryDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple("FactoryDescriptor")
            .field(&self.constructed)
            .finish()
    }
}
