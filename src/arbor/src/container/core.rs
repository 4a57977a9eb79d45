use std::any::TypeId;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, MutexGuard};

use crate::container::binder::BindRequest;
use crate::container::graph::{Graph, InstanceId, LockId, LockKind};
use crate::container::injector::{
    Injector, RawLease, ResolveContext, ResolveError, ResolveFrame, Resolver,
};
use crate::container::instance::Instance;
use crate::container::Managed;
use crate::key::Key;
use crate::lifecycle::{self, Disposable, DisposeError, Lifecycled, UsageGuard};
use crate::provider::{Activator, Arguments};
use crate::tree::{NodeId, NodeTree, ResolvePath};

/// A request to resolve `key` as seen from `origin`, leaving a lock of
/// `kind` owned by `origin`.
pub(crate) struct ResolveRequest {
    pub origin: InstanceId,
    pub key: Box<dyn Key>,
    pub context: Arc<ResolveContext>,
    pub frame: ResolveFrame,
    pub kind: LockKind,
}

/// A request to obtain an instance of `node` under the anchoring instance
/// `parent`, leaving a lock of `kind` owned by `owner`.
#[derive(Clone)]
pub(crate) struct Acquire {
    pub node: NodeId,
    pub parent: InstanceId,
    pub owner: InstanceId,
    pub kind: LockKind,
    pub key: Box<dyn Key>,
    pub context: Arc<ResolveContext>,
    pub frame: ResolveFrame,
}

pub(crate) struct Acquired {
    pub lease: RawLease,
    /// Whether this request created the instance.
    pub created: bool,
}

pub(crate) struct Activated {
    pub instance: Arc<Instance>,
    /// The creator's lock on the new instance.
    pub lock: LockId,
}

pub(crate) struct Core {
    tree: NodeTree,
    structure: Mutex<Graph>,
}

impl Core {
    pub fn new(tree: NodeTree) -> Arc<Self> {
        Arc::new(Self {
            tree,
            structure: Mutex::new(Graph::new()),
        })
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    /// Takes the structural lock. Never start a disposal or drop a lease
    /// while holding it.
    pub fn structure(&self) -> MutexGuard<'_, Graph> {
        self.structure.lock()
    }

    /// Creates the root scope instance, retained by a master lock.
    pub fn spawn_root(self: &Arc<Self>) -> (InstanceId, LockId) {
        let mut structure = self.structure();
        let Some(root) = structure.insert_instance(Arc::downgrade(self), self.tree.root(), None)
        else {
            unreachable!("the root instance has no parent that could be disposing")
        };
        root.set_object(Arc::new(()));
        let Some(master) = structure.add_lock(None, root.id(), LockKind::Master) else {
            unreachable!("a fresh root instance should accept its master lock")
        };
        structure.set_external(master, true);
        (root.id(), master)
    }

    pub fn usage(&self, id: InstanceId, key: &dyn Key) -> Result<UsageGuard, ResolveError> {
        let instance = self.structure().instance(id).cloned();
        instance
            .and_then(|instance| instance.lifecycle().usage())
            .ok_or_else(|| ResolveError::disposed(key))
    }

    pub fn resolve(
        self: &Arc<Self>,
        request: ResolveRequest,
    ) -> BoxFuture<'static, Result<RawLease, ResolveError>> {
        let core = Arc::clone(self);
        async move { core.resolve_impl(request).await }.boxed()
    }

    async fn resolve_impl(
        self: &Arc<Self>,
        request: ResolveRequest,
    ) -> Result<RawLease, ResolveError> {
        let ResolveRequest {
            origin,
            key,
            context,
            frame,
            kind,
        } = request;

        if let Some(object) = context.argument(key.as_ref()) {
            return Ok(RawLease::detached(Arc::clone(self), object));
        }
        if is_resolver_key(key.as_ref()) {
            let resolver = Resolver::new(Arc::clone(self), origin);
            return Ok(RawLease::detached(Arc::clone(self), Arc::new(resolver)));
        }

        let path = self.find_path(origin, key.as_ref())?;
        tracing::trace!(%key, %origin, %path, "resolving");

        let target = path.target();
        let node = self.tree.get(target);
        let anchor = node
            .binder()
            .bind(
                self,
                BindRequest {
                    origin,
                    path: path.clone(),
                    key: key.clone(),
                    context: Arc::clone(&context),
                    frame: frame.clone(),
                },
            )
            .await?;

        let res = if path.is_empty() {
            self.lease_anchor(anchor.parent(), origin, kind, key.as_ref())
        } else {
            let request = Acquire {
                node: target,
                parent: anchor.parent(),
                owner: origin,
                kind,
                key,
                context,
                frame,
            };
            node.multiplicity()
                .acquire(self, request)
                .await
                .map(|acquired| acquired.lease)
        };
        anchor.finish(res).await
    }

    fn find_path(&self, origin: InstanceId, key: &dyn Key) -> Result<ResolvePath, ResolveError> {
        let origin_node = self.structure().instance(origin).map(|instance| instance.node());
        let Some(origin_node) = origin_node else {
            return Err(ResolveError::disposed(key));
        };
        match self.tree.lookup(origin_node, key) {
            Some(path) => Ok(path.clone()),
            None => Err(ResolveError::NotFound {
                key: key.dyn_clone(),
            }),
        }
    }

    fn lease_anchor(
        self: &Arc<Self>,
        anchor: InstanceId,
        owner: InstanceId,
        kind: LockKind,
        key: &dyn Key,
    ) -> Result<RawLease, ResolveError> {
        let mut structure = self.structure();
        self.lease_in(&mut structure, owner, anchor, kind, key)
    }

    /// Adds a lock on a constructed instance and wraps it in a lease.
    pub fn lease_in(
        self: &Arc<Self>,
        structure: &mut Graph,
        owner: InstanceId,
        target: InstanceId,
        kind: LockKind,
        key: &dyn Key,
    ) -> Result<RawLease, ResolveError> {
        let Some(instance) = structure.instance(target) else {
            return Err(ResolveError::disposed(key));
        };
        // Only an instance still under construction has no object yet, and
        // reaching it again means the chain loops back onto itself.
        let Some(object) = instance.object() else {
            return Err(ResolveError::CyclicDependency {
                key: key.dyn_clone(),
            });
        };
        let lock = structure
            .add_lock(Some(owner), target, kind)
            .ok_or_else(|| ResolveError::disposed(key))?;
        structure.set_external(lock, true);
        Ok(RawLease::edge(Arc::clone(self), lock, target, object))
    }

    pub fn activate(
        self: &Arc<Self>,
        request: Acquire,
    ) -> BoxFuture<'static, Result<Activated, ResolveError>> {
        let core = Arc::clone(self);
        async move { core.activate_impl(request).await }.boxed()
    }

    async fn activate_impl(self: &Arc<Self>, request: Acquire) -> Result<Activated, ResolveError> {
        let (instance, lock) = self.create_instance(&request)?;
        let key = request.key.clone();
        let res = match self.tree.get(request.node).activator() {
            Some(activator) => self.construct(&instance, Arc::clone(activator), request).await,
            None => Ok(Arc::new(()) as Arc<dyn Managed>),
        };
        match res {
            Ok(object) => {
                instance.set_object(object);
                tracing::trace!(%key, instance = %instance.id(), "activated");
                Ok(Activated { instance, lock })
            }
            Err(err) => {
                tracing::debug!(%key, error = %err, "activation failed");
                self.discard(instance).await;
                Err(err)
            }
        }
    }

    fn create_instance(
        self: &Arc<Self>,
        request: &Acquire,
    ) -> Result<(Arc<Instance>, LockId), ResolveError> {
        let mut structure = self.structure();
        let instance = structure
            .insert_instance(Arc::downgrade(self), request.node, Some(request.parent))
            .ok_or_else(|| ResolveError::disposed(request.key.as_ref()))?;
        match structure.add_lock(Some(request.owner), instance.id(), request.kind) {
            Some(lock) => Ok((instance, lock)),
            None => {
                structure.remove_instance(instance.id());
                Err(ResolveError::disposed(request.key.as_ref()))
            }
        }
    }

    /// Resolves the dependencies one after another with the new instance as
    /// origin, then runs the activator.
    async fn construct(
        self: &Arc<Self>,
        instance: &Arc<Instance>,
        activator: Arc<dyn Activator>,
        request: Acquire,
    ) -> Result<Arc<dyn Managed>, ResolveError> {
        let Acquire {
            node,
            key,
            context,
            frame,
            ..
        } = request;
        let frame = frame.push(node, instance.id());

        let mut leases = Vec::with_capacity(activator.dependencies().len());
        for dependency in activator.dependencies() {
            let lease = self
                .resolve(ResolveRequest {
                    origin: instance.id(),
                    key: dependency.clone(),
                    context: Arc::clone(&context),
                    frame: frame.clone(),
                    kind: LockKind::Pin,
                })
                .await?;
            leases.push(lease);
        }

        let objects = leases.iter().map(|lease| Arc::clone(lease.object())).collect();
        let arguments = Arguments::new(objects);
        let injector = Injector::new(Arc::clone(self), instance.id(), key.clone(), context, frame);
        let object = activator.construct(arguments, injector).await?;

        for lease in leases {
            self.keep(instance.id(), lease, key.as_ref())?;
        }
        Ok(object)
    }

    /// Turns a lease on a dependency into locks owned by `consumer` for its
    /// whole lifetime, and wires the reference edge back from the dependency.
    ///
    /// Scope locks on instances enclosing the consumer are released instead,
    /// as the consumer cannot outlive those anyway.
    pub fn keep(
        &self,
        consumer: InstanceId,
        mut lease: RawLease,
        key: &dyn Key,
    ) -> Result<(), ResolveError> {
        let scopes = lease.take_scopes();
        let edge = lease.take_edge();
        let mut redundant = Vec::new();
        let res = {
            let mut structure = self.structure();
            for (lock, scope) in scopes {
                if structure.is_within(consumer, scope) {
                    redundant.push(lock);
                } else {
                    structure.set_external(lock, false);
                }
            }
            match edge {
                Some((lock, dependency)) => {
                    structure.set_external(lock, false);
                    if dependency == consumer {
                        Ok(())
                    } else {
                        structure
                            .add_lock(Some(dependency), consumer, LockKind::Reference)
                            .map(drop)
                            .ok_or_else(|| ResolveError::disposed(key))
                    }
                }
                None => Ok(()),
            }
        };
        for lock in redundant {
            self.release(lock);
        }
        res
    }

    /// Dooms an instance which never became usable, then disposes it.
    pub async fn discard(&self, instance: Arc<Instance>) {
        let doomed = self.structure().doom(instance.id());
        drop(doomed);
        instance.start_dispose();
        let _ = instance.disposed().await;
    }

    pub fn release_lock(&self, lock: LockId) -> Result<Option<Arc<Instance>>, DisposeError> {
        self.structure().release(lock)
    }

    /// Releases a lock without waiting for the disposal it may trigger.
    pub fn release(&self, lock: LockId) {
        match self.release_lock(lock) {
            Ok(Some(instance)) => instance.start_dispose(),
            Ok(None) => {}
            Err(err) => lifecycle::report_unobserved(&err),
        }
    }
}

fn is_resolver_key(key: &dyn Key) -> bool {
    key.target_type() == TypeId::of::<Resolver>() && key.qualifier_type() == TypeId::of::<()>()
}
