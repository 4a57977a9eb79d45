use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::container::core::ResolveRequest;
use crate::container::graph::{InstanceId, LockKind};
use crate::container::injector::{Lease, ResolveArgs, ResolveContext, ResolveError, ResolveFrame};
use crate::container::Core;
use crate::key::TypedKey;

/// Resolves objects as seen from one instance.
///
/// A component may depend on `Resolver` itself, in which case it receives a
/// resolver whose origin is the component's own instance.
#[derive(Clone)]
pub struct Resolver {
    core: Arc<Core>,
    origin: InstanceId,
}

impl Resolver {
    pub(crate) fn new(core: Arc<Core>, origin: InstanceId) -> Self {
        Self { core, origin }
    }

    pub fn origin(&self) -> InstanceId {
        self.origin
    }

    pub async fn get<K: TypedKey>(&self, key: K) -> Result<Lease<K::Target>, ResolveError> {
        self.get_with(key, ResolveArgs::new()).await
    }

    pub async fn get_with<K: TypedKey>(
        &self,
        key: K,
        arguments: ResolveArgs,
    ) -> Result<Lease<K::Target>, ResolveError> {
        let _usage = self.core.usage(self.origin, &key)?;
        let context = ResolveContext::root(&self.core, arguments);
        let res = self
            .core
            .resolve(ResolveRequest {
                origin: self.origin,
                key: Box::new(key),
                context,
                frame: ResolveFrame::default(),
                kind: LockKind::Transient,
            })
            .await;
        Lease::new(res?, &key)
    }

    /// Resolves the key and releases the lease right away, leaving any
    /// memoised instance in place.
    pub async fn warm_up<K: TypedKey>(&self, key: K) -> Result<(), ResolveError> {
        let lease = self.get(key).await?;
        drop(lease);
        Ok(())
    }
}

impl Debug for Resolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Resolver")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
