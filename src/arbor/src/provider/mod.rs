//! Construction and teardown strategies for provided objects.

pub mod closure;
pub mod component;
pub mod dispose;
pub mod instance;

use std::any;
use std::error::Error;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::container::injector::{Injector, ResolveError};
use crate::container::registry::ConfigError;
use crate::container::Managed;
use crate::key::Key;
use crate::util::any::DowncastRef;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Constructs the objects of one provider node.
///
/// The engine resolves every key in [`Activator::dependencies`] before
/// calling [`Activator::construct`], and passes the resolved objects in the
/// same order as [`Arguments`]. Those dependencies stay alive for as long as
/// the constructed object does. Anything else may be fetched lazily through
/// the [`Injector`].
pub trait Activator: Send + Sync + 'static {
    fn dependencies(&self) -> &[Box<dyn Key>];

    /// # Errors
    ///
    /// Returns [`ResolveError::ObjectConstruction`] if the user code fails,
    /// or whatever error a lazy lookup through the injector produced.
    fn construct(
        &self,
        arguments: Arguments,
        injector: Injector,
    ) -> BoxFuture<'static, Result<Arc<dyn Managed>, ResolveError>>;
}

/// The resolved dependencies of an activator, in declaration order.
#[derive(Clone)]
pub struct Arguments {
    objects: Vec<Arc<dyn Managed>>,
}

impl Arguments {
    pub fn new(objects: Vec<Arc<dyn Managed>>) -> Self {
        Self { objects }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// # Errors
    ///
    /// Returns [`ResolveError::ArgumentMismatch`] if there is no argument at
    /// `index` or it is not a `T`.
    pub fn get<T: Managed>(&self, index: usize) -> Result<&T, ResolveError> {
        self.objects
            .get(index)
            .and_then(|object| object.downcast_ref::<T>())
            .ok_or(ResolveError::ArgumentMismatch {
                index,
                expected: any::type_name::<T>(),
            })
    }

    /// Like [`Arguments::get`], cloning the argument out.
    pub fn take<T: Managed + Clone>(&self, index: usize) -> Result<T, ResolveError> {
        self.get::<T>(index).cloned()
    }

    pub fn cursor(&self) -> ArgumentCursor<'_> {
        ArgumentCursor {
            arguments: self,
            next: 0,
        }
    }
}

/// Takes arguments one after another.
pub struct ArgumentCursor<'a> {
    arguments: &'a Arguments,
    next: usize,
}

impl ArgumentCursor<'_> {
    pub fn take_next<T: Managed + Clone>(&mut self) -> Result<T, ResolveError> {
        let index = self.next;
        self.next += 1;
        self.arguments.take(index)
    }
}

/// Rejects a parameter list naming the same key twice.
pub(crate) fn check_unique_parameters(
    component: &'static str,
    parameters: &[Box<dyn Key>],
) -> Result<(), ConfigError> {
    for (i, key) in parameters.iter().enumerate() {
        if parameters[..i].contains(key) {
            return Err(ConfigError::DuplicateParameter {
                component,
                key: key.clone(),
            });
        }
    }
    Ok(())
}

/// Wraps a failure of user code.
pub(crate) fn construction_error(key: &dyn Key, err: BoxError) -> ResolveError {
    ResolveError::ObjectConstruction {
        key: key.dyn_clone(),
        source: Arc::from(err),
    }
}
