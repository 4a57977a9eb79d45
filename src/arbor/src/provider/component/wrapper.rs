use std::any;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use crate::container::injector::{Injector, ResolveError};
use crate::container::registry::ConfigError;
use crate::container::Managed;
use crate::key::Key;
use crate::provider::component::{Component, Constructor};
use crate::provider::{check_unique_parameters, construction_error, Activator, Arguments};

pub struct ComponentActivator<C>
where
    C: Component,
{
    constructor: Constructor<C>,
}

impl<C> ComponentActivator<C>
where
    C: Component,
{
    /// # Errors
    ///
    /// Returns an error unless `C` declares exactly one constructor whose
    /// parameters are pairwise distinct.
    pub fn new() -> Result<Self, ConfigError> {
        let component = any::type_name::<C>();
        let mut constructors = C::constructors();
        let constructor = match constructors.len() {
            0 => return Err(ConfigError::NoConstructor { component }),
            1 => constructors.remove(0),
            count => return Err(ConfigError::MultipleConstructors { component, count }),
        };
        check_unique_parameters(component, constructor.parameters())?;
        Ok(Self { constructor })
    }
}

impl<C> Debug for ComponentActivator<C>
where
    C: Component,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ComponentActivator")
            .field("component", &any::type_name::<C>())
            .field("constructor", &self.constructor)
            .finish()
    }
}

impl<C> Activator for ComponentActivator<C>
where
    C: Component,
{
    fn dependencies(&self) -> &[Box<dyn Key>] {
        self.constructor.parameters()
    }

    fn construct(
        &self,
        arguments: Arguments,
        injector: Injector,
    ) -> BoxFuture<'static, Result<Arc<dyn Managed>, ResolveError>> {
        let res = match self.constructor.invoke(&arguments) {
            Ok(Ok(component)) => Ok(Arc::new(component.post_process()) as Arc<dyn Managed>),
            Ok(Err(err)) => Err(construction_error(injector.key(), err)),
            Err(err) => Err(err),
        };
        future::ready(res).boxed()
    }
}
