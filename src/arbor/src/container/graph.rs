//! The instance arena and the lock edges between instances.
//!
//! Everything here is mutated under the single structural lock held by
//! [`Core`](crate::container::Core). Edges are plain ids, which keeps the
//! possibly cyclic ownership graph free of reference cycles.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::{Arc, Weak};

use crate::container::instance::Instance;
use crate::container::Core;
use crate::lifecycle::DisposeError;
use crate::tree::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl Display for InstanceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "instance#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockId(u64);

impl LockId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for LockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "lock#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Held by the host on the root scope instance.
    Master,
    /// Held by a scope instance on its singleton children.
    Child,
    /// Held by a dependency on the instances constructed from it.
    Reference,
    /// Returned to callers of `get`.
    Transient,
    /// Held by a consumer on its dependencies.
    Pin,
    /// Held for the duration of one resolve call.
    Temporary,
}

impl LockKind {
    /// Whether the lock keeps its target alive.
    pub fn retains(self) -> bool {
        !matches!(self, Self::Reference)
    }

    /// Whether disposing the owner forces the target to be disposed, as
    /// opposed to merely releasing the lock.
    pub fn propagates(self) -> bool {
        matches!(self, Self::Master | Self::Child | Self::Reference)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Alive,
    /// Lost its last retainer. Whoever observed the transition starts its
    /// disposal.
    Doomed,
    Disposing,
}

struct InstanceRecord {
    instance: Arc<Instance>,
    parent: Option<InstanceId>,
    held: HashSet<LockId>,
    owned: HashSet<LockId>,
    status: Status,
}

struct LockRecord {
    kind: LockKind,
    owner: Option<InstanceId>,
    target: InstanceId,
    /// Released later by a lease or a resolve context rather than by the
    /// graph itself.
    external: bool,
}

/// Counts of live graph entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub instances: usize,
    pub locks: usize,
}

pub(crate) struct Graph {
    instances: HashMap<InstanceId, InstanceRecord>,
    locks: HashMap<LockId, LockRecord>,
    severed: HashSet<LockId>,
    next_instance: u64,
    next_lock: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            instances: HashMap::new(),
            locks: HashMap::new(),
            severed: HashSet::new(),
            next_instance: 0,
            next_lock: 0,
        }
    }

    /// Creates an instance of `node` under `parent`. Fails when the parent is
    /// already being disposed.
    pub fn insert_instance(
        &mut self,
        core: Weak<Core>,
        node: NodeId,
        parent: Option<InstanceId>,
    ) -> Option<Arc<Instance>> {
        if let Some(parent) = parent {
            if !self.accepts_owner(parent) {
                return None;
            }
        }
        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        let instance = Arc::new(Instance::new(id, node, core));
        self.instances.insert(
            id,
            InstanceRecord {
                instance: Arc::clone(&instance),
                parent,
                held: HashSet::new(),
                owned: HashSet::new(),
                status: Status::Alive,
            },
        );
        tracing::trace!(%id, %node, "instance created");
        Some(instance)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Arc<Instance>> {
        self.instances.get(&id).map(|record| &record.instance)
    }

    pub fn is_alive(&self, id: InstanceId) -> bool {
        self.instances
            .get(&id)
            .is_some_and(|record| record.status == Status::Alive)
    }

    /// Whether `id` is `scope` itself or one of its descendants.
    pub fn is_within(&self, id: InstanceId, scope: InstanceId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            if id == scope {
                return true;
            }
            current = self.instances.get(&id).and_then(|record| record.parent);
        }
        false
    }

    /// Walks up from `from`, itself included, to the first instance of `node`.
    pub fn ancestor_of_node(&self, from: InstanceId, node: NodeId) -> Option<InstanceId> {
        let mut current = Some(from);
        while let Some(id) = current {
            let record = self.instances.get(&id)?;
            if record.instance.node() == node {
                return Some(id);
            }
            current = record.parent;
        }
        None
    }

    fn accepts_owner(&self, owner: InstanceId) -> bool {
        self.instances
            .get(&owner)
            .is_some_and(|record| record.status != Status::Disposing)
    }

    /// Adds an edge from `owner` to `target`. The target must be alive and
    /// the owner must not have started disposing.
    pub fn add_lock(
        &mut self,
        owner: Option<InstanceId>,
        target: InstanceId,
        kind: LockKind,
    ) -> Option<LockId> {
        if !self.is_alive(target) || !owner.map_or(true, |owner| self.accepts_owner(owner)) {
            return None;
        }
        let lock = LockId(self.next_lock);
        self.next_lock += 1;
        self.locks.insert(
            lock,
            LockRecord {
                kind,
                owner,
                target,
                external: false,
            },
        );
        if let Some(owner) = owner {
            if let Some(record) = self.instances.get_mut(&owner) {
                record.owned.insert(lock);
            }
        }
        if let Some(record) = self.instances.get_mut(&target) {
            record.held.insert(lock);
        }
        tracing::trace!(%lock, ?kind, ?owner, %target, "lock added");
        Some(lock)
    }

    /// Marks `lock` as released from outside the graph.
    pub fn set_external(&mut self, lock: LockId, external: bool) {
        if let Some(record) = self.locks.get_mut(&lock) {
            record.external = external;
        }
    }

    /// Releases a lock. Returns the target when it lost its last retainer,
    /// in which case the caller has to start its disposal.
    pub fn release(&mut self, lock: LockId) -> Result<Option<Arc<Instance>>, DisposeError> {
        let Some(record) = self.locks.remove(&lock) else {
            return if self.severed.remove(&lock) {
                Ok(None)
            } else {
                Err(DisposeError::LockReleased { lock: lock.get() })
            };
        };
        if let Some(owner) = record.owner.and_then(|owner| self.instances.get_mut(&owner)) {
            owner.owned.remove(&lock);
        }
        if let Some(target) = self.instances.get_mut(&record.target) {
            target.held.remove(&lock);
        }
        tracing::trace!(%lock, kind = ?record.kind, "lock released");
        Ok(self.doom_if_unretained(record.target))
    }

    fn doom_if_unretained(&mut self, id: InstanceId) -> Option<Arc<Instance>> {
        let record = self.instances.get(&id)?;
        if record.status != Status::Alive {
            return None;
        }
        let retained = record
            .held
            .iter()
            .filter_map(|lock| self.locks.get(lock))
            .any(|lock| lock.kind.retains());
        if retained {
            return None;
        }
        let record = self.instances.get_mut(&id)?;
        record.status = Status::Doomed;
        Some(Arc::clone(&record.instance))
    }

    /// Marks an instance as doomed regardless of its retainers. Returns it if
    /// the caller performed the transition.
    pub fn doom(&mut self, id: InstanceId) -> Option<Arc<Instance>> {
        let record = self.instances.get_mut(&id)?;
        if record.status != Status::Alive {
            return None;
        }
        record.status = Status::Doomed;
        Some(Arc::clone(&record.instance))
    }

    /// First teardown phase: severs inbound locks and forces the targets of
    /// propagating owned locks. Returns every such target still present,
    /// which the caller has to dispose and await.
    pub fn begin_dispose(&mut self, id: InstanceId) -> Vec<Arc<Instance>> {
        let Some(record) = self.instances.get_mut(&id) else {
            return Vec::new();
        };
        record.status = Status::Disposing;
        let held: Vec<LockId> = record.held.drain().collect();
        let parent = record.parent;
        let instance = Arc::clone(&record.instance);

        for lock in held {
            self.sever(lock);
        }

        if let Some(parent) = parent.and_then(|parent| self.instance(parent)).cloned() {
            parent.data(self).detach(instance.node(), id);
        }

        let propagating: Vec<LockId> = self.instances[&id]
            .owned
            .iter()
            .copied()
            .filter(|lock| self.locks.get(lock).is_some_and(|record| record.kind.propagates()))
            .collect();
        let mut forced = Vec::new();
        for lock in propagating {
            let Some(target) = self.detach_owned(id, lock) else {
                continue;
            };
            // Targets doomed by someone else are awaited as well, so none of
            // them outlives this teardown.
            self.doom(target);
            forced.extend(self.instance(target).cloned());
        }
        forced
    }

    /// Third teardown phase: releases the remaining owned locks. Returns the
    /// targets which lost their last retainer.
    pub fn release_owned(&mut self, id: InstanceId) -> Vec<Arc<Instance>> {
        let owned: Vec<LockId> = match self.instances.get_mut(&id) {
            Some(record) => record.owned.iter().copied().collect(),
            None => return Vec::new(),
        };
        let mut doomed = Vec::new();
        for lock in owned {
            if let Some(target) = self.detach_owned(id, lock) {
                if let Some(target) = self.doom_if_unretained(target) {
                    doomed.push(target);
                }
            }
        }
        doomed
    }

    pub fn remove_instance(&mut self, id: InstanceId) {
        if let Some(record) = self.instances.remove(&id) {
            debug_assert!(record.held.is_empty(), "a removed instance should hold no locks");
            debug_assert!(record.owned.is_empty(), "a removed instance should own no locks");
            tracing::trace!(%id, "instance removed");
        }
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            instances: self.instances.len(),
            locks: self.locks.len(),
        }
    }

    /// Kinds of the locks held on `id`.
    pub fn held_kinds(&self, id: InstanceId) -> Vec<LockKind> {
        self.instances
            .get(&id)
            .map(|record| {
                record
                    .held
                    .iter()
                    .filter_map(|lock| self.locks.get(lock))
                    .map(|lock| lock.kind)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Removes an inbound lock of an instance that started disposing. The
    /// owner's later release of it is silent.
    fn sever(&mut self, lock: LockId) {
        let Some(record) = self.locks.remove(&lock) else {
            return;
        };
        if let Some(owner) = record.owner.and_then(|owner| self.instances.get_mut(&owner)) {
            owner.owned.remove(&lock);
        }
        if record.external {
            self.severed.insert(lock);
        }
    }

    /// Removes a lock owned by `owner` and returns its target.
    fn detach_owned(&mut self, owner: InstanceId, lock: LockId) -> Option<InstanceId> {
        if let Some(record) = self.instances.get_mut(&owner) {
            record.owned.remove(&lock);
        }
        let record = self.locks.remove(&lock)?;
        if record.external {
            self.severed.insert(lock);
        }
        if let Some(target) = self.instances.get_mut(&record.target) {
            target.held.remove(&lock);
        }
        Some(record.target)
    }
}
