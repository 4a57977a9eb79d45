use std::any;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::container::injector::{Injector, ResolveError};
use crate::container::Managed;
use crate::key::Key;
use crate::provider::closure::RawFactory;
use crate::provider::{construction_error, Activator, Arguments};

/// Runs a factory which resolves its dependencies through the injector.
pub struct RawFactoryActivator<F>
where
    F: RawFactory,
{
    factory: Arc<F>,
}

impl<F> RawFactoryActivator<F>
where
    F: RawFactory,
{
    pub fn new(factory: Arc<F>) -> Self {
        Self { factory }
    }
}

impl<F> Debug for RawFactoryActivator<F>
where
    F: RawFactory,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RawFactoryActivator")
            .field("constructed", &any::type_name::<F::Constructed>())
            .finish_non_exhaustive()
    }
}

impl<F> Activator for RawFactoryActivator<F>
where
    F: RawFactory,
{
    fn dependencies(&self) -> &[Box<dyn Key>] {
        &[]
    }

    fn construct(
        &self,
        _arguments: Arguments,
        injector: Injector,
    ) -> BoxFuture<'static, Result<Arc<dyn Managed>, ResolveError>> {
        let key = injector.key().dyn_clone();
        let running = self.factory.produce(injector);
        async move {
            match running.await {
                Ok(object) => Ok(Arc::new(object) as Arc<dyn Managed>),
                Err(err) => Err(construction_error(key.as_ref(), err.into())),
            }
        }
        .boxed()
    }
}
