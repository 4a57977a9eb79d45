//! Teardown of provided objects.

use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use crate::config::DisposeCapability;
use crate::container::Managed;
use crate::lifecycle::DisposeError;
use crate::provider::BoxError;

/// Tears an object down once its instance is being disposed.
///
/// Called exactly once per instance, after everything the instance owns
/// strongly has been disposed.
#[cfg_attr(test, mockall::automock)]
pub trait DisposeHandler: Send + Sync + 'static {
    fn dispose(&self, object: Arc<dyn Managed>) -> BoxFuture<'static, Result<(), DisposeError>>;
}

/// Objects which release their resources synchronously.
///
/// Implementing the trait is not enough for the object to be torn down: its
/// binding has to opt in through
/// [`Binding::disposable`](crate::module::dsl::Binding::disposable).
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self);
}

/// Objects which release their resources asynchronously.
///
/// Like [`Dispose`], this takes effect only for bindings declared with
/// [`Binding::async_disposable`](crate::module::dsl::Binding::async_disposable).
pub trait AsyncDispose: Send + Sync + 'static {
    fn dispose_async(&self) -> BoxFuture<'_, Result<(), BoxError>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDisposeHandler;

impl DisposeHandler for NoopDisposeHandler {
    fn dispose(&self, _object: Arc<dyn Managed>) -> BoxFuture<'static, Result<(), DisposeError>> {
        future::ready(Ok(())).boxed()
    }
}

pub struct SyncDisposeHandler<F>
where
    F: Fn(&dyn Managed) + Send + Sync + ?Sized + 'static,
{
    dispose: Arc<F>,
}

impl<F> SyncDisposeHandler<F>
where
    F: Fn(&dyn Managed) + Send + Sync + ?Sized + 'static,
{
    pub fn new(dispose: Arc<F>) -> Self {
        Self { dispose }
    }
}

impl<F> DisposeHandler for SyncDisposeHandler<F>
where
    F: Fn(&dyn Managed) + Send + Sync + ?Sized + 'static,
{
    fn dispose(&self, object: Arc<dyn Managed>) -> BoxFuture<'static, Result<(), DisposeError>> {
        (self.dispose)(&*object);
        future::ready(Ok(())).boxed()
    }
}

pub struct AsyncDisposeHandler<F>
where
    F: Fn(Arc<dyn Managed>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync + ?Sized,
    F: 'static,
{
    dispose: Arc<F>,
}

impl<F> AsyncDisposeHandler<F>
where
    F: Fn(Arc<dyn Managed>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync + ?Sized,
    F: 'static,
{
    pub fn new(dispose: Arc<F>) -> Self {
        Self { dispose }
    }
}

impl<F> DisposeHandler for AsyncDisposeHandler<F>
where
    F: Fn(Arc<dyn Managed>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync + ?Sized,
    F: 'static,
{
    fn dispose(&self, object: Arc<dyn Managed>) -> BoxFuture<'static, Result<(), DisposeError>> {
        let object_name = (*object).type_name();
        let teardown = (self.dispose)(object);
        async move {
            teardown
                .await
                .map_err(|err| DisposeError::Handler {
                    object: object_name,
                    source: Arc::from(err),
                })
        }
        .boxed()
    }
}

/// Turns a declared capability into a handler.
pub(crate) fn handler_for(capability: &DisposeCapability) -> Arc<dyn DisposeHandler> {
    match capability {
        DisposeCapability::None => Arc::new(NoopDisposeHandler),
        DisposeCapability::Sync(dispose) => Arc::new(SyncDisposeHandler::new(Arc::clone(dispose))),
        DisposeCapability::Async(dispose) => {
            Arc::new(AsyncDisposeHandler::new(Arc::clone(dispose)))
        }
        DisposeCapability::Handler(handler) => Arc::clone(handler),
    }
}
