//! The provider node tree.
//!
//! The tree is assembled once by the build phase and read concurrently,
//! without locking, by every resolve afterwards.

mod node;
mod path;
mod visibility;

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::container::registry::ConfigError;
use crate::key::Key;

pub use node::{NodeParts, ProviderNode};
pub use path::ResolvePath;
pub use visibility::{AllowAll, DenyAll, KeySet, PatternVisibility, Visibility};

#[cfg(test)]
pub use visibility::MockVisibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct NodeTree {
    nodes: Vec<ProviderNode>,
}

impl NodeTree {
    pub(crate) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn insert_root(&mut self, mut node: ProviderNode) -> NodeId {
        debug_assert!(self.nodes.is_empty(), "the tree already has a root");
        let id = NodeId(self.nodes.len());
        node.seed_self(id);
        self.nodes.push(node);
        id
    }

    /// Registers `node` as the last child of `parent`.
    ///
    /// The child's table is seeded with its own zero-length path and the
    /// parent's table with a one-length path to the child.
    pub(crate) fn register_child(
        &mut self,
        parent: NodeId,
        mut node: ProviderNode,
    ) -> Result<NodeId, ConfigError> {
        let key = node.key().dyn_clone();
        let parent_node = &self.nodes[parent.0];
        if parent_node.key() == key.as_ref() || parent_node.child(key.as_ref()).is_some() {
            return Err(ConfigError::KeyDuplicated { key });
        }

        let id = NodeId(self.nodes.len());
        node.set_parent(parent);
        node.seed_self(id);
        self.nodes.push(node);

        let parent_node = &mut self.nodes[parent.0];
        parent_node.add_child(key.dyn_clone(), id);
        parent_node
            .visible_mut()
            .insert(key, ResolvePath::to_child(parent, id));
        Ok(id)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> &ProviderNode {
        &self.nodes[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut ProviderNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in registration order. Parents always precede their children.
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn lookup(&self, from: NodeId, key: &dyn Key) -> Option<&ResolvePath> {
        self.get(from).visible(key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::key;

    use super::*;

    struct ScopeA;
    struct ScopeB;

    fn node(key: Box<dyn Key>) -> ProviderNode {
        ProviderNode::new(NodeParts::scope(key))
    }

    #[test]
    fn node_tree_register_child_succeeds() {
        let mut tree = NodeTree::new();
        let root = tree.insert_root(node(Box::new(key::of::<ScopeA>())));
        let child = tree
            .register_child(root, node(Box::new(key::of::<u32>())))
            .unwrap();

        assert_eq!(tree.get(child).parent(), Some(root));
        assert_eq!(tree.get(root).children(), &[child]);
        assert_eq!(
            tree.lookup(root, &key::of::<u32>()),
            Some(&ResolvePath::to_child(root, child))
        );
        assert_eq!(
            tree.lookup(child, &key::of::<u32>()),
            Some(&ResolvePath::to_self(child))
        );
        assert_eq!(
            tree.lookup(root, &key::of::<ScopeA>()),
            Some(&ResolvePath::to_self(root))
        );
        assert!(tree.lookup(child, &key::of::<ScopeA>()).is_none());
    }

    #[test]
    fn node_tree_register_child_fails_when_key_is_duplicated() {
        let mut tree = NodeTree::new();
        let root = tree.insert_root(node(Box::new(key::of::<ScopeA>())));
        tree.register_child(root, node(Box::new(key::named::<u32>("a"))))
            .unwrap();
        tree.register_child(root, node(Box::new(key::named::<u32>("b"))))
            .unwrap();

        let err = tree
            .register_child(root, node(Box::new(key::named::<u32>("a"))))
            .unwrap_err();
        assert!(matches!(err, ConfigError::KeyDuplicated { .. }));
    }

    #[test]
    fn node_tree_register_child_fails_when_child_shares_parent_key() {
        let mut tree = NodeTree::new();
        let root = tree.insert_root(node(Box::new(key::of::<ScopeA>())));
        let err = tree
            .register_child(root, node(Box::new(key::of::<ScopeA>())))
            .unwrap_err();
        assert!(matches!(err, ConfigError::KeyDuplicated { .. }));

        let scope = tree
            .register_child(root, node(Box::new(key::of::<ScopeB>())))
            .unwrap();
        assert!(tree
            .register_child(scope, node(Box::new(key::of::<Arc<str>>())))
            .is_ok());
    }
}
