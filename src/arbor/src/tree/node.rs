use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::container::{Multiplicity, ScopeBinder};
use crate::key::Key;
use crate::provider::dispose::{DisposeHandler, NoopDisposeHandler};
use crate::provider::Activator;
use crate::tree::{AllowAll, DenyAll, NodeId, ResolvePath, Visibility};

/// The strategies a node is assembled from.
pub struct NodeParts {
    pub key: Box<dyn Key>,
    pub export: Arc<dyn Visibility>,
    pub export_to_parent: Arc<dyn Visibility>,
    pub import: Arc<dyn Visibility>,
    pub binder: ScopeBinder,
    pub activator: Option<Arc<dyn Activator>>,
    pub multiplicity: Multiplicity,
    pub dispose_handler: Arc<dyn DisposeHandler>,
}

impl NodeParts {
    /// Parts of a plain scope node with every strategy at its default.
    pub fn scope(key: Box<dyn Key>) -> Self {
        Self {
            key,
            export: Arc::new(AllowAll),
            export_to_parent: Arc::new(DenyAll),
            import: Arc::new(AllowAll),
            binder: ScopeBinder::Registration,
            activator: None,
            multiplicity: Multiplicity::Singleton,
            dispose_handler: Arc::new(NoopDisposeHandler),
        }
    }
}

impl Debug for NodeParts {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("NodeParts")
            .field("key", &self.key)
            .field("binder", &self.binder)
            .field("multiplicity", &self.multiplicity)
            .field("activator", &self.activator.is_some())
            .finish_non_exhaustive()
    }
}

pub struct ProviderNode {
    key: Box<dyn Key>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    child_index: HashMap<Box<dyn Key>, NodeId>,
    export: Arc<dyn Visibility>,
    export_to_parent: Arc<dyn Visibility>,
    import: Arc<dyn Visibility>,
    binder: ScopeBinder,
    activator: Option<Arc<dyn Activator>>,
    multiplicity: Multiplicity,
    dispose_handler: Arc<dyn DisposeHandler>,
    visible: HashMap<Box<dyn Key>, ResolvePath>,
}

impl ProviderNode {
    pub fn new(parts: NodeParts) -> Self {
        let NodeParts {
            key,
            export,
            export_to_parent,
            import,
            binder,
            activator,
            multiplicity,
            dispose_handler,
        } = parts;
        Self {
            key,
            parent: None,
            children: Vec::new(),
            child_index: HashMap::new(),
            export,
            export_to_parent,
            import,
            binder,
            activator,
            multiplicity,
            dispose_handler,
            visible: HashMap::new(),
        }
    }

    pub fn key(&self) -> &dyn Key {
        self.key.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child(&self, key: &dyn Key) -> Option<NodeId> {
        self.child_index.get(key).copied()
    }

    pub fn export(&self) -> &dyn Visibility {
        self.export.as_ref()
    }

    pub fn export_to_parent(&self) -> &dyn Visibility {
        self.export_to_parent.as_ref()
    }

    pub fn import(&self) -> &dyn Visibility {
        self.import.as_ref()
    }

    pub fn binder(&self) -> ScopeBinder {
        self.binder
    }

    pub fn activator(&self) -> Option<&Arc<dyn Activator>> {
        self.activator.as_ref()
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    pub fn dispose_handler(&self) -> &Arc<dyn DisposeHandler> {
        &self.dispose_handler
    }

    pub fn visible(&self, key: &dyn Key) -> Option<&ResolvePath> {
        self.visible.get(key)
    }

    pub fn visible_entries(&self) -> impl Iterator<Item = (&dyn Key, &ResolvePath)> {
        self.visible.iter().map(|(key, path)| (key.as_ref(), path))
    }

    pub(crate) fn visible_mut(&mut self) -> &mut HashMap<Box<dyn Key>, ResolvePath> {
        &mut self.visible
    }

    pub(super) fn set_parent(&mut self, parent: NodeId) {
        self.parent = Some(parent);
    }

    pub(super) fn seed_self(&mut self, id: NodeId) {
        self.visible
            .insert(self.key.dyn_clone(), ResolvePath::to_self(id));
    }

    pub(super) fn add_child(&mut self, key: Box<dyn Key>, child: NodeId) {
        self.children.push(child);
        self.child_index.insert(key, child);
    }
}

impl Debug for ProviderNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ProviderNode")
            .field("key", &self.key)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("multiplicity", &self.multiplicity)
            .field("binder", &self.binder)
            .field("visible", &self.visible.len())
            .finish_non_exhaustive()
    }
}
