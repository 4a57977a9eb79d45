use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use futures::future::FutureExt;
use parking_lot::Mutex;

use crate::config::NodeConfig;
use crate::container::graph::{GraphStats, InstanceId, LockId};
use crate::container::injector::{Lease, ResolveArgs, ResolveError, Resolver};
use crate::container::registry::{self, ConfigError, ConfigurerImpl, Pipeline, Registry};
use crate::container::Core;
use crate::key::{self, TypedKey};
use crate::lifecycle::{Disposable, Disposed, DisposeError, Lifecycle, Lifecycled, Teardown};
use crate::module::Module;
use crate::tree::NodeTree;

/// Identifies the root scope of a host assembled from a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootScope;

/// A running node tree together with its root scope instance.
///
/// Clones share the same tree. The root scope instance lives until
/// [`Host::shutdown`] is called or the last clone is dropped.
#[derive(Clone)]
pub struct Host {
    inner: Arc<HostInner>,
}

struct HostInner {
    core: Arc<Core>,
    root: InstanceId,
    master: Mutex<Option<LockId>>,
    lifecycle: Lifecycle,
}

impl Host {
    /// Builds a host from an explicit configuration tree with the default
    /// pipeline.
    pub fn build(config: NodeConfig) -> Result<Self, ConfigError> {
        Self::build_with(Arc::new(config), &Pipeline::default())
    }

    pub fn build_with(config: Arc<NodeConfig>, pipeline: &Pipeline) -> Result<Self, ConfigError> {
        let tree = registry::build_tree(&config, pipeline)?;
        Ok(Self::start(tree))
    }

    fn start(tree: NodeTree) -> Self {
        let nodes = tree.len();
        let core = Core::new(tree);
        let (root, master) = core.spawn_root();
        tracing::debug!(nodes, %root, "host started");
        Self {
            inner: Arc::new(HostInner {
                core,
                root,
                master: Mutex::new(Some(master)),
                lifecycle: Lifecycle::new(),
            }),
        }
    }

    /// A resolver whose origin is the root scope instance.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(Arc::clone(&self.inner.core), self.inner.root)
    }

    pub fn tree(&self) -> &NodeTree {
        self.inner.core.tree()
    }

    pub fn stats(&self) -> GraphStats {
        self.inner.core.structure().stats()
    }

    pub async fn get<K: TypedKey>(&self, key: K) -> Result<Lease<K::Target>, ResolveError> {
        self.get_with(key, ResolveArgs::new()).await
    }

    /// Resolves `key` from the root scope with extra arguments, which take
    /// precedence over every provider for the keys they are given under.
    pub async fn get_with<K: TypedKey>(
        &self,
        key: K,
        arguments: ResolveArgs,
    ) -> Result<Lease<K::Target>, ResolveError> {
        let Some(_usage) = self.inner.lifecycle.usage() else {
            return Err(ResolveError::disposed(&key));
        };
        self.resolver().get_with(key, arguments).await
    }

    /// Resolves `key` once so that a memoised object exists before it is
    /// first needed.
    pub async fn warm_up<K: TypedKey>(&self, key: K) -> Result<(), ResolveError> {
        let lease = self.get(key).await?;
        drop(lease);
        Ok(())
    }

    /// Disposes the root scope instance, and with it everything, then waits
    /// for the teardown to complete.
    pub async fn shutdown(&self) -> Result<(), DisposeError> {
        self.start_dispose();
        self.disposed().await
    }
}

impl Registry for Host {
    fn init<M: Module>(module: M) -> Result<Self, ConfigError> {
        let mut configurer = ConfigurerImpl::new();
        module.setup(&mut configurer);
        let config = configurer.finish(Box::new(key::of::<RootScope>()))?;
        Self::build(config)
    }
}

impl Disposable for Host {
    fn start_dispose(&self) {
        self.inner.start_dispose();
    }

    fn disposed(&self) -> Disposed {
        self.inner.disposed()
    }
}

impl Debug for Host {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Host")
            .field("root", &self.inner.root)
            .field("lifecycle", &self.inner.lifecycle)
            .finish_non_exhaustive()
    }
}

impl Lifecycled for HostInner {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn on_dispose_started(&self) -> Result<(), DisposeError> {
        tracing::debug!(root = %self.root, "host shutting down");
        Ok(())
    }

    fn teardown(self: Arc<Self>) -> Teardown {
        async move {
            let Some(master) = self.master.lock().take() else {
                return Ok(());
            };
            let root = {
                let mut structure = self.core.structure();
                let released = structure.release(master)?;
                let doomed = structure.doom(self.root);
                released.or(doomed)
            };
            if let Some(root) = root {
                root.start_dispose();
                root.disposed().await?;
            }
            tracing::debug!(root = %self.root, "host shut down");
            Ok(())
        }
        .boxed()
    }
}

impl Drop for HostInner {
    fn drop(&mut self) {
        if let Some(master) = self.master.get_mut().take() {
            self.core.release(master);
        }
    }
}
