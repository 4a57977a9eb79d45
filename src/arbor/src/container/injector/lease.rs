use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::sync::Arc;

use crate::container::graph::{InstanceId, LockId};
use crate::container::injector::ResolveError;
use crate::container::{Core, Managed};
use crate::key::Key;
use crate::lifecycle::{Disposable, DisposeError};

enum Claim {
    Edge { lock: LockId, target: InstanceId },
    Detached,
}

/// An untyped claim on a resolved object. Dropping it releases the lock.
///
/// The lease also holds the locks on the intermediate scope instances the
/// object was reached through, outermost first. They are released after the
/// claim itself.
pub(crate) struct RawLease {
    core: Arc<Core>,
    claim: Claim,
    object: Arc<dyn Managed>,
    scopes: Vec<(LockId, InstanceId)>,
}

impl RawLease {
    pub fn edge(
        core: Arc<Core>,
        lock: LockId,
        target: InstanceId,
        object: Arc<dyn Managed>,
    ) -> Self {
        Self {
            core,
            claim: Claim::Edge { lock, target },
            object,
            scopes: Vec::new(),
        }
    }

    /// A lease over an object the graph does not own, such as a supplied
    /// argument or a resolver handle.
    pub fn detached(core: Arc<Core>, object: Arc<dyn Managed>) -> Self {
        Self {
            core,
            claim: Claim::Detached,
            object,
            scopes: Vec::new(),
        }
    }

    /// Moves the locks of `holds` into this lease.
    pub fn through(mut self, holds: Vec<RawLease>) -> Self {
        self.scopes = holds
            .into_iter()
            .filter_map(|mut hold| hold.take_edge())
            .collect();
        self
    }

    pub fn object(&self) -> &Arc<dyn Managed> {
        &self.object
    }

    pub fn target(&self) -> Option<InstanceId> {
        match self.claim {
            Claim::Edge { target, .. } => Some(target),
            Claim::Detached => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self.claim, Claim::Detached)
    }

    pub fn downcast<T: Managed>(&self, key: &dyn Key) -> Result<&T, ResolveError> {
        let object: &dyn Managed = &*self.object;
        object
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| ResolveError::type_mismatch::<T>(key))
    }

    /// Hands the lock over to the graph, leaving the lease detached.
    pub fn take_edge(&mut self) -> Option<(LockId, InstanceId)> {
        match mem::replace(&mut self.claim, Claim::Detached) {
            Claim::Edge { lock, target } => Some((lock, target)),
            Claim::Detached => None,
        }
    }

    /// Hands the scope locks over to the caller.
    pub fn take_scopes(&mut self) -> Vec<(LockId, InstanceId)> {
        mem::take(&mut self.scopes)
    }

    /// Every lock of the lease, in release order.
    fn take_locks(&mut self) -> Vec<LockId> {
        let claim = self.take_edge().map(|(lock, _)| lock);
        let scopes = self.take_scopes().into_iter().rev().map(|(lock, _)| lock);
        claim.into_iter().chain(scopes).collect()
    }

    /// Releases every lock and waits for the disposals this triggered. The
    /// first failure is returned once all locks are released.
    pub async fn release(mut self) -> Result<(), DisposeError> {
        let mut res = Ok(());
        for lock in self.take_locks() {
            let step = match self.core.release_lock(lock) {
                Ok(Some(instance)) => {
                    instance.start_dispose();
                    instance.disposed().await
                }
                Ok(None) => Ok(()),
                Err(err) => Err(err),
            };
            res = res.and(step);
        }
        res
    }
}

impl Drop for RawLease {
    fn drop(&mut self) {
        for lock in self.take_locks() {
            self.core.release(lock);
        }
    }
}

/// A typed claim on a resolved object.
///
/// The object stays alive at least as long as the lease. Dropping the lease
/// releases its lock; [`Lease::release`] does the same and also waits for
/// any disposal the release triggered.
pub struct Lease<T: Managed> {
    raw: RawLease,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Managed> Lease<T> {
    pub(crate) fn new(raw: RawLease, key: &dyn Key) -> Result<Self, ResolveError> {
        raw.downcast::<T>(key)?;
        Ok(Self {
            raw,
            _marker: PhantomData,
        })
    }

    pub fn get(&self) -> &T {
        let object: &dyn Managed = &*self.raw.object;
        match object.as_any().downcast_ref::<T>() {
            Some(object) => object,
            None => unreachable!("the leased object should have been checked to be a `T`"),
        }
    }

    /// Whether the lease owns no lock, as for supplied arguments.
    pub fn is_detached(&self) -> bool {
        self.raw.is_detached()
    }

    pub async fn release(self) -> Result<(), DisposeError> {
        self.raw.release().await
    }
}

impl<T: Managed + Clone> Lease<T> {
    pub fn cloned(&self) -> T {
        self.get().clone()
    }
}

impl<T: Managed> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<T: Managed + Debug> Debug for Lease<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple("Lease").field(self.get()).finish()
    }
}
