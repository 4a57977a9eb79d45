//! How many instances a provider node produces, and where they are cached.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::container::core::{Acquire, Acquired};
use crate::container::graph::{Graph, InstanceId, LockKind};
use crate::container::injector::{RawLease, ResolveError};
use crate::container::instance::Slot;
use crate::container::Core;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Multiplicity {
    /// One instance per anchoring scope instance.
    ///
    /// Cycles are only detected within one resolve. Two concurrent resolves
    /// whose creations wait on each other never complete.
    #[default]
    Singleton,
    /// One instance per top-level resolve call.
    PerResolve,
    /// A new instance for every request.
    Transient,
}

impl Multiplicity {
    pub(crate) fn acquire(
        self,
        core: &Arc<Core>,
        request: Acquire,
    ) -> BoxFuture<'static, Result<Acquired, ResolveError>> {
        self.strategy().acquire(core, request)
    }

    fn strategy(self) -> &'static dyn Strategy {
        match self {
            Self::Singleton => &Memoised(SlotHome::Parent),
            Self::PerResolve => &Memoised(SlotHome::Context),
            Self::Transient => &Unshared,
        }
    }
}

trait Strategy: Send + Sync {
    fn acquire(
        &self,
        core: &Arc<Core>,
        request: Acquire,
    ) -> BoxFuture<'static, Result<Acquired, ResolveError>>;
}

/// Where memoised instances are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotHome {
    /// The child slots of the anchoring instance, retained by a child lock.
    Parent,
    /// The slots of the root resolve context, retained by a temporary lock
    /// released with the context.
    Context,
}

impl SlotHome {
    fn creator_kind(self) -> LockKind {
        match self {
            Self::Parent => LockKind::Child,
            Self::Context => LockKind::Temporary,
        }
    }

    fn get(self, structure: &Graph, request: &Acquire) -> Result<Option<Slot>, ResolveError> {
        match self {
            Self::Parent => {
                let parent = structure
                    .instance(request.parent)
                    .ok_or_else(|| ResolveError::disposed(request.key.as_ref()))?;
                Ok(parent.data(structure).get(request.node))
            }
            Self::Context => Ok(request.context.state(structure).slots().get(request.node)),
        }
    }

    /// Replaces the slot and returns the previous one, to be dropped once the
    /// structural lock has been released.
    fn set(self, structure: &Graph, request: &Acquire, slot: Option<Slot>) -> Option<Slot> {
        match self {
            Self::Parent => {
                let parent = structure.instance(request.parent)?;
                let mut slots = parent.data(structure);
                match slot {
                    Some(slot) => slots.insert(request.node, slot),
                    None => slots.remove(request.node),
                }
            }
            Self::Context => {
                let mut state = request.context.state(structure);
                match slot {
                    Some(slot) => state.slots().insert(request.node, slot),
                    None => state.slots().remove(request.node),
                }
            }
        }
    }
}

struct Memoised(SlotHome);

impl Strategy for Memoised {
    fn acquire(
        &self,
        core: &Arc<Core>,
        request: Acquire,
    ) -> BoxFuture<'static, Result<Acquired, ResolveError>> {
        acquire_memoised(Arc::clone(core), request, self.0).boxed()
    }
}

/// Reuses the cached instance if there is a live one, joins the creation in
/// flight if there is one, and otherwise starts a creation itself.
async fn acquire_memoised(
    core: Arc<Core>,
    request: Acquire,
    home: SlotHome,
) -> Result<Acquired, ResolveError> {
    let mut created = false;
    loop {
        if request.frame.contains(request.node) {
            return Err(ResolveError::CyclicDependency {
                key: request.key.clone(),
            });
        }

        let (creation, stale) = {
            let mut structure = core.structure();
            match home.get(&structure, &request)? {
                Some(Slot::Ready(id)) if structure.is_alive(id) => {
                    let lease = core.lease_in(
                        &mut structure,
                        request.owner,
                        id,
                        request.kind,
                        request.key.as_ref(),
                    )?;
                    return Ok(Acquired { lease, created });
                }
                Some(Slot::InFlight(creation)) => (creation, None),
                stale => {
                    let creation = create(Arc::clone(&core), request.clone(), home)
                        .boxed()
                        .shared();
                    let previous =
                        home.set(&structure, &request, Some(Slot::InFlight(creation.clone())));
                    created = true;
                    (creation, previous.or(stale))
                }
            }
        };
        drop(stale);
        creation.await?;
    }
}

async fn create(
    core: Arc<Core>,
    request: Acquire,
    home: SlotHome,
) -> Result<InstanceId, ResolveError> {
    let creator = Acquire {
        owner: request.parent,
        kind: home.creator_kind(),
        ..request.clone()
    };
    let res = core.activate(creator).await;

    let stale = {
        let mut structure = core.structure();
        match &res {
            Ok(activated) => {
                let id = activated.instance.id();
                if home == SlotHome::Context {
                    structure.set_external(activated.lock, true);
                    request.context.state(&structure).hold(activated.lock);
                }
                home.set(&structure, &request, Some(Slot::Ready(id)))
            }
            Err(_) => home.set(&structure, &request, None),
        }
    };
    drop(stale);
    res.map(|activated| activated.instance.id())
}

struct Unshared;

impl Strategy for Unshared {
    fn acquire(
        &self,
        core: &Arc<Core>,
        request: Acquire,
    ) -> BoxFuture<'static, Result<Acquired, ResolveError>> {
        acquire_unshared(Arc::clone(core), request).boxed()
    }
}

/// Creates a fresh instance retained only by the requester's lock.
async fn acquire_unshared(core: Arc<Core>, request: Acquire) -> Result<Acquired, ResolveError> {
    if request.frame.contains(request.node) {
        return Err(ResolveError::CyclicDependency { key: request.key });
    }
    let activated = core.activate(request).await?;
    let Some(object) = activated.instance.object() else {
        unreachable!("an activated instance should hold its object");
    };
    core.structure().set_external(activated.lock, true);
    let lease = RawLease::edge(
        Arc::clone(&core),
        activated.lock,
        activated.instance.id(),
        object,
    );
    Ok(Acquired {
        lease,
        created: true,
    })
}
