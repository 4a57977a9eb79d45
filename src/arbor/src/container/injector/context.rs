use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::container::graph::{Graph, InstanceId, LockId};
use crate::container::instance::Slots;
use crate::container::{Core, Managed};
use crate::key::{Key, TypedKey};
use crate::tree::NodeId;

/// Extra objects supplied by the caller of a resolve. They take precedence
/// over anything the tree provides for the same key.
#[derive(Clone, Default)]
pub struct ResolveArgs {
    values: HashMap<Box<dyn Key>, Arc<dyn Managed>>,
}

impl ResolveArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: TypedKey>(mut self, key: K, value: K::Target) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<K: TypedKey>(&mut self, key: K, value: K::Target) {
        self.values.insert(Box::new(key), Arc::new(value));
    }

    pub fn get(&self, key: &dyn Key) -> Option<&Arc<dyn Managed>> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Debug for ResolveArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// State of one top-level resolve call.
///
/// Nested contexts add arguments but share the root's per-resolve slots and
/// temporary locks, which are released when the root goes away.
pub(crate) struct ResolveContext {
    arguments: ResolveArgs,
    parent: Option<Arc<ResolveContext>>,
    root: Arc<ContextRoot>,
}

pub(crate) struct ContextRoot {
    core: Weak<Core>,
    state: Mutex<ContextState>,
}

#[derive(Default)]
pub(crate) struct ContextState {
    slots: Slots,
    temporaries: Vec<LockId>,
}

impl ResolveContext {
    pub fn root(core: &Arc<Core>, arguments: ResolveArgs) -> Arc<Self> {
        Arc::new(Self {
            arguments,
            parent: None,
            root: Arc::new(ContextRoot {
                core: Arc::downgrade(core),
                state: Mutex::new(ContextState::default()),
            }),
        })
    }

    pub fn nested(parent: &Arc<Self>, arguments: ResolveArgs) -> Arc<Self> {
        Arc::new(Self {
            arguments,
            parent: Some(Arc::clone(parent)),
            root: Arc::clone(&parent.root),
        })
    }

    /// Looks the key up in the arguments of this context and its ancestors.
    pub fn argument(&self, key: &dyn Key) -> Option<Arc<dyn Managed>> {
        let mut current = Some(self);
        while let Some(context) = current {
            if let Some(value) = context.arguments.get(key) {
                return Some(Arc::clone(value));
            }
            current = context.parent.as_deref();
        }
        None
    }

    /// Per-resolve state shared by the whole chain. Taking it requires the
    /// structural lock.
    pub fn state<'a>(&'a self, _structure: &'a Graph) -> MutexGuard<'a, ContextState> {
        self.root.state.lock()
    }
}

impl ContextState {
    pub fn slots(&mut self) -> &mut Slots {
        &mut self.slots
    }

    pub fn hold(&mut self, lock: LockId) {
        self.temporaries.push(lock);
    }
}

impl Drop for ContextRoot {
    fn drop(&mut self) {
        let temporaries = std::mem::take(&mut self.state.get_mut().temporaries);
        if temporaries.is_empty() {
            return;
        }
        let Some(core) = self.core.upgrade() else {
            return;
        };
        tracing::trace!(count = temporaries.len(), "releasing per-resolve locks");
        for lock in temporaries {
            core.release(lock);
        }
    }
}

/// Activations in progress along one resolve chain, innermost first.
#[derive(Clone, Default)]
pub(crate) struct ResolveFrame {
    top: Option<Arc<FrameEntry>>,
}

struct FrameEntry {
    node: NodeId,
    instance: InstanceId,
    previous: Option<Arc<FrameEntry>>,
}

impl ResolveFrame {
    pub fn push(&self, node: NodeId, instance: InstanceId) -> Self {
        Self {
            top: Some(Arc::new(FrameEntry {
                node,
                instance,
                previous: self.top.clone(),
            })),
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries().any(|entry| entry.node == node)
    }

    #[cfg(test)]
    pub fn instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.entries().map(|entry| entry.instance)
    }

    fn entries(&self) -> impl Iterator<Item = &FrameEntry> + '_ {
        std::iter::successors(self.top.as_deref(), |entry| entry.previous.as_deref())
    }
}

impl Debug for ResolveFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_list()
            .entries(self.entries().map(|entry| (entry.node, entry.instance)))
            .finish()
    }
}
