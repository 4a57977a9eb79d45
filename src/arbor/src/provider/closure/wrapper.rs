use std::any;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use crate::container::injector::{Injector, ResolveError};
use crate::container::registry::ConfigError;
use crate::container::Managed;
use crate::key::Key;
use crate::provider::closure::Factory;
use crate::provider::{check_unique_parameters, construction_error, Activator, Arguments};

pub struct FactoryActivator<F, D>
where
    F: Factory<D>,
    D: Send + Sync + 'static,
{
    factory: Arc<F>,
    dependencies: Vec<Box<dyn Key>>,
    _marker: PhantomData<fn() -> D>,
}

impl<F, D> FactoryActivator<F, D>
where
    F: Factory<D>,
    D: Send + Sync + 'static,
{
    /// # Errors
    ///
    /// Returns an error if two parameters of the factory share a key.
    pub fn new(factory: Arc<F>) -> Result<Self, ConfigError> {
        let dependencies = F::dependencies();
        check_unique_parameters(any::type_name::<F::Constructed>(), &dependencies)?;
        Ok(Self {
            factory,
            dependencies,
            _marker: PhantomData,
        })
    }
}

impl<F, D> Debug for FactoryActivator<F, D>
where
    F: Factory<D>,
    D: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FactoryActivator")
            .field("constructed", &any::type_name::<F::Constructed>())
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl<F, D> Activator for FactoryActivator<F, D>
where
    F: Factory<D>,
    D: Send + Sync + 'static,
{
    fn dependencies(&self) -> &[Box<dyn Key>] {
        &self.dependencies
    }

    fn construct(
        &self,
        arguments: Arguments,
        injector: Injector,
    ) -> BoxFuture<'static, Result<Arc<dyn Managed>, ResolveError>> {
        let running = match self.factory.start(&arguments) {
            Ok(running) => running,
            Err(err) => return future::ready(Err(err)).boxed(),
        };
        let key = injector.key().dyn_clone();
        async move {
            match running.await {
                Ok(object) => Ok(Arc::new(object) as Arc<dyn Managed>),
                Err(err) => Err(construction_error(key.as_ref(), err.into())),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    #[test]
    fn factory_activator_new_succeeds() {
        let factory = Arc::new(|a: i32, b: &'static str| async move {
            Ok::<_, Infallible>(format!("{b}{a}"))
        });
        let activator = FactoryActivator::new(factory).unwrap();
        assert_eq!(activator.dependencies().len(), 2);
    }

    #[test]
    fn factory_activator_new_fails_when_parameters_repeat() {
        let factory = Arc::new(|a: i32, b: i32| async move { Ok::<_, Infallible>(a + b) });
        let err = FactoryActivator::new(factory).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateParameter { .. }));
    }
}
