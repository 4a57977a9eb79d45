use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::container::core::{Acquire, Acquired};
use crate::container::graph::{InstanceId, LockKind};
use crate::container::injector::{RawLease, ResolveContext, ResolveError, ResolveFrame};
use crate::container::instance::Instance;
use crate::container::Core;
use crate::key::Key;
use crate::tree::ResolvePath;

/// Selects the instance a resolved object is anchored under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ScopeBinder {
    /// Anchors under the instance of the scope the provider is registered
    /// in, found by walking up from the requester.
    #[default]
    Registration,
}

impl ScopeBinder {
    pub(crate) fn bind(
        self,
        core: &Arc<Core>,
        request: BindRequest,
    ) -> BoxFuture<'static, Result<Anchor, ResolveError>> {
        match self {
            Self::Registration => bind_registration(Arc::clone(core), request).boxed(),
        }
    }
}

pub(crate) struct BindRequest {
    pub origin: InstanceId,
    pub path: ResolvePath,
    pub key: Box<dyn Key>,
    pub context: Arc<ResolveContext>,
    pub frame: ResolveFrame,
}

async fn bind_registration(core: Arc<Core>, request: BindRequest) -> Result<Anchor, ResolveError> {
    let BindRequest {
        origin,
        path,
        key,
        context,
        frame,
    } = request;

    let root = core.structure().ancestor_of_node(origin, path.root());
    let Some(root) = root else {
        return Err(ResolveError::ScopeNotFound { key });
    };

    let mut anchor = Anchor::new(Arc::clone(&core), root);
    for &node in path.intermediates() {
        let scope = core.tree().get(node);
        let request = Acquire {
            node,
            parent: anchor.parent,
            owner: origin,
            kind: LockKind::Temporary,
            key: scope.key().dyn_clone(),
            context: Arc::clone(&context),
            frame: frame.clone(),
        };
        match scope.multiplicity().acquire(&core, request).await {
            Ok(acquired) => anchor.descend(acquired),
            Err(err) => {
                anchor.abandon().await;
                return Err(err);
            }
        }
    }
    Ok(anchor)
}

/// The instance a resolve continues under, together with the temporary
/// locks the requester took on the intermediate scopes leading to it.
pub(crate) struct Anchor {
    core: Arc<Core>,
    parent: InstanceId,
    holds: Vec<RawLease>,
    created: Vec<Arc<Instance>>,
}

impl Anchor {
    fn new(core: Arc<Core>, parent: InstanceId) -> Self {
        Self {
            core,
            parent,
            holds: Vec::new(),
            created: Vec::new(),
        }
    }

    pub fn parent(&self) -> InstanceId {
        self.parent
    }

    fn descend(&mut self, acquired: Acquired) {
        let Acquired { lease, created } = acquired;
        if let Some(target) = lease.target() {
            if created {
                let instance = self.core.structure().instance(target).cloned();
                self.created.extend(instance);
            }
            self.parent = target;
        }
        self.holds.push(lease);
    }

    /// Moves the temporary locks into the resolved lease, so the scopes stay
    /// alive as long as it does. On failure, the intermediate instances this
    /// resolve created are disposed before the error is returned.
    pub async fn finish(
        self,
        res: Result<RawLease, ResolveError>,
    ) -> Result<RawLease, ResolveError> {
        match res {
            Ok(lease) => Ok(lease.through(self.holds)),
            Err(err) => {
                self.abandon().await;
                Err(err)
            }
        }
    }

    async fn abandon(self) {
        let Self {
            core,
            holds,
            created,
            ..
        } = self;
        drop(holds);
        for instance in created.into_iter().rev() {
            core.discard(instance).await;
        }
    }
}
