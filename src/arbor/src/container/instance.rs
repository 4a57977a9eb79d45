use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, OnceLock, Weak};

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, MutexGuard};

use crate::container::graph::{Graph, InstanceId};
use crate::container::injector::ResolveError;
use crate::container::{Core, Managed};
use crate::lifecycle::{self, Disposable, DisposeError, Lifecycle, Lifecycled, Teardown};
use crate::tree::NodeId;

/// A creation in progress, observed by every concurrent resolver of the same
/// cache key.
pub(crate) type Creation = Shared<BoxFuture<'static, Result<InstanceId, ResolveError>>>;

#[derive(Clone)]
pub(crate) enum Slot {
    InFlight(Creation),
    Ready(InstanceId),
}

/// Memoised instances keyed by provider node.
#[derive(Default)]
pub(crate) struct Slots {
    slots: HashMap<NodeId, Slot>,
}

impl Slots {
    pub fn get(&self, node: NodeId) -> Option<Slot> {
        self.slots.get(&node).cloned()
    }

    pub fn insert(&mut self, node: NodeId, slot: Slot) -> Option<Slot> {
        self.slots.insert(node, slot)
    }

    pub fn remove(&mut self, node: NodeId) -> Option<Slot> {
        self.slots.remove(&node)
    }

    /// Clears the slot of `node` when it still refers to `id`.
    pub fn detach(&mut self, node: NodeId, id: InstanceId) {
        if matches!(self.slots.get(&node), Some(Slot::Ready(current)) if *current == id) {
            self.slots.remove(&node);
        }
    }
}

pub(crate) struct Instance {
    id: InstanceId,
    node: NodeId,
    core: Weak<Core>,
    object: OnceLock<Arc<dyn Managed>>,
    slots: Mutex<Slots>,
    lifecycle: Lifecycle,
}

impl Instance {
    pub fn new(id: InstanceId, node: NodeId, core: Weak<Core>) -> Self {
        Self {
            id,
            node,
            core,
            object: OnceLock::new(),
            slots: Mutex::new(Slots::default()),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The produced object, available once creation has completed.
    pub fn object(&self) -> Option<Arc<dyn Managed>> {
        self.object.get().cloned()
    }

    pub fn set_object(&self, object: Arc<dyn Managed>) {
        let res = self.object.set(object);
        debug_assert!(res.is_ok(), "an instance should be constructed only once");
    }

    /// Child slots of this instance. Taking them requires the structural
    /// lock, which keeps the two locks ordered.
    pub fn data<'a>(&'a self, _structure: &'a Graph) -> MutexGuard<'a, Slots> {
        self.slots.lock()
    }
}

impl Lifecycled for Instance {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn on_dispose_started(&self) -> Result<(), DisposeError> {
        tracing::trace!(instance = %self.id, node = %self.node, "dispose started");
        Ok(())
    }

    fn teardown(self: Arc<Self>) -> Teardown {
        async move {
            let Some(core) = self.core.upgrade() else {
                return Ok(());
            };

            let forced = core.structure().begin_dispose(self.id);
            settle(forced).await;

            let res = match self.object.get() {
                Some(object) => {
                    let handler = core.tree().get(self.node).dispose_handler();
                    handler.dispose(Arc::clone(object)).await
                }
                None => Ok(()),
            };
            if let Err(err) = &res {
                lifecycle::report_unobserved(err);
            }

            let released = core.structure().release_owned(self.id);
            settle(released).await;

            core.structure().remove_instance(self.id);
            tracing::trace!(instance = %self.id, "disposed");
            res
        }
        .boxed()
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

/// Starts the disposal of every instance and waits for all of them.
///
/// Failures were already reported by the failing instance itself.
pub(crate) async fn settle(instances: Vec<Arc<Instance>>) {
    if instances.is_empty() {
        return;
    }
    for instance in &instances {
        instance.start_dispose();
    }
    join_all(instances.iter().map(|instance| instance.disposed())).await;
}
