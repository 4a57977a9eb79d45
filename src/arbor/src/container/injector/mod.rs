mod context;
mod lease;
mod resolver;

use std::any;
use std::error::Error;
use std::sync::Arc;

use snafu::prelude::*;

use crate::container::core::ResolveRequest;
use crate::container::graph::{InstanceId, LockKind};
use crate::container::{Core, Managed};
use crate::key::{Key, TypedKey};

pub use context::ResolveArgs;
pub use lease::Lease;
pub use resolver::Resolver;

pub(crate) use context::{ResolveContext, ResolveFrame};
pub(crate) use lease::RawLease;

/// The handle a raw factory receives to resolve dependencies of the
/// instance it constructs.
///
/// Dependencies obtained here stay pinned for the lifetime of that instance.
#[derive(Clone)]
pub struct Injector {
    core: Arc<Core>,
    instance: InstanceId,
    key: Box<dyn Key>,
    context: Arc<ResolveContext>,
    frame: ResolveFrame,
}

impl Injector {
    pub(crate) fn new(
        core: Arc<Core>,
        instance: InstanceId,
        key: Box<dyn Key>,
        context: Arc<ResolveContext>,
        frame: ResolveFrame,
    ) -> Self {
        Self {
            core,
            instance,
            key,
            context,
            frame,
        }
    }

    /// The key of the object being constructed.
    pub fn key(&self) -> &dyn Key {
        self.key.as_ref()
    }

    pub async fn get<K>(&self, key: K) -> Result<K::Target, ResolveError>
    where
        K: TypedKey<Target: Clone>,
    {
        self.get_in(key, Arc::clone(&self.context)).await
    }

    /// Like [`Injector::get`], with extra arguments visible to this lookup
    /// and to everything it constructs.
    pub async fn get_with<K>(
        &self,
        key: K,
        arguments: ResolveArgs,
    ) -> Result<K::Target, ResolveError>
    where
        K: TypedKey<Target: Clone>,
    {
        let context = ResolveContext::nested(&self.context, arguments);
        self.get_in(key, context).await
    }

    async fn get_in<K>(
        &self,
        key: K,
        context: Arc<ResolveContext>,
    ) -> Result<K::Target, ResolveError>
    where
        K: TypedKey<Target: Clone>,
    {
        let lease = self
            .core
            .resolve(ResolveRequest {
                origin: self.instance,
                key: Box::new(key),
                context,
                frame: self.frame.clone(),
                kind: LockKind::Pin,
            })
            .await?;
        let object = lease.downcast::<K::Target>(&key)?.clone();
        self.core.keep(self.instance, lease, &key)?;
        Ok(object)
    }

    /// A resolver whose origin is the instance being constructed.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(Arc::clone(&self.core), self.instance)
    }
}

#[derive(Debug, Clone, Snafu)]
#[non_exhaustive]
pub enum ResolveError {
    #[snafu(display("could not find the object identified by the given key {key}"))]
    #[non_exhaustive]
    NotFound { key: Box<dyn Key> },
    #[snafu(display("could not construct the object {key} which depends on itself somehow"))]
    #[non_exhaustive]
    CyclicDependency { key: Box<dyn Key> },
    #[snafu(display("could not construct the object {key}"))]
    #[non_exhaustive]
    ObjectConstruction {
        key: Box<dyn Key>,
        source: Arc<dyn Error + Send + Sync>,
    },
    #[snafu(display("could not find the scope instance anchoring {key} above the requester"))]
    #[non_exhaustive]
    ScopeNotFound { key: Box<dyn Key> },
    #[snafu(display("could not resolve {key} because its owner is being disposed"))]
    #[non_exhaustive]
    Disposed { key: Box<dyn Key> },
    #[snafu(display("the object provided for {key} is not a {expected}"))]
    #[non_exhaustive]
    TypeMismatch {
        key: Box<dyn Key>,
        expected: &'static str,
    },
    #[snafu(display("argument {index} is not a {expected}"))]
    #[non_exhaustive]
    ArgumentMismatch { index: usize, expected: &'static str },
}

impl ResolveError {
    pub(crate) fn type_mismatch<T: Managed>(key: &dyn Key) -> Self {
        Self::TypeMismatch {
            key: key.dyn_clone(),
            expected: any::type_name::<T>(),
        }
    }

    pub(crate) fn disposed(key: &dyn Key) -> Self {
        Self::Disposed {
            key: key.dyn_clone(),
        }
    }
}
