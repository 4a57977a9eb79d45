use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use crate::container::injector::{Injector, ResolveError};
use crate::container::Managed;
use crate::key::Key;
use crate::provider::{Activator, Arguments};

/// Hands out an object that already exists.
///
/// The object has no dependencies and is ready as soon as it is asked for.
/// Every instance of the node shares it.
pub struct InstanceActivator {
    object: Arc<dyn Managed>,
}

impl InstanceActivator {
    pub fn new(object: Arc<dyn Managed>) -> Self {
        Self { object }
    }
}

impl Debug for InstanceActivator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InstanceActivator")
            .field("object", &(*self.object).type_name())
            .finish()
    }
}

impl Activator for InstanceActivator {
    fn dependencies(&self) -> &[Box<dyn Key>] {
        &[]
    }

    fn construct(
        &self,
        _arguments: Arguments,
        _injector: Injector,
    ) -> BoxFuture<'static, Result<Arc<dyn Managed>, ResolveError>> {
        future::ready(Ok(Arc::clone(&self.object))).boxed()
    }
}
