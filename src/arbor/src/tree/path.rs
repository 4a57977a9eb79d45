use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::tree::NodeId;

/// A downward path through the node tree, from a scope node to the node
/// providing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvePath {
    root: NodeId,
    path: Vec<NodeId>,
}

impl ResolvePath {
    pub fn new(root: NodeId, path: Vec<NodeId>) -> Self {
        Self { root, path }
    }

    pub fn to_self(node: NodeId) -> Self {
        Self::new(node, Vec::new())
    }

    pub fn to_child(parent: NodeId, child: NodeId) -> Self {
        Self::new(parent, vec![child])
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn target(&self) -> NodeId {
        self.path.last().copied().unwrap_or(self.root)
    }

    /// Nodes strictly between the root and the target.
    pub fn intermediates(&self) -> &[NodeId] {
        match self.path.split_last() {
            Some((_, intermediates)) => intermediates,
            None => &[],
        }
    }

    /// Returns the same target seen from `root`, one level above the current
    /// root.
    pub fn re_root(&self, root: NodeId) -> Self {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.push(self.root);
        path.extend_from_slice(&self.path);
        Self { root, path }
    }
}

impl Display for ResolvePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.root)?;
        for node in &self.path {
            write!(f, " -> {node}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_path_target_succeeds() {
        assert_eq!(ResolvePath::to_self(NodeId(3)).target(), NodeId(3));
        assert_eq!(
            ResolvePath::new(NodeId(0), vec![NodeId(1), NodeId(4)]).target(),
            NodeId(4)
        );
    }

    #[test]
    fn resolve_path_re_root_succeeds() {
        let path = ResolvePath::to_child(NodeId(1), NodeId(2)).re_root(NodeId(0));

        assert_eq!(path.root(), NodeId(0));
        assert_eq!(path.path(), &[NodeId(1), NodeId(2)]);
        assert_eq!(path.intermediates(), &[NodeId(1)]);
        assert_eq!(path.to_string(), "node#0 -> node#1 -> node#2");

        let own = ResolvePath::to_self(NodeId(5)).re_root(NodeId(4));
        assert_eq!(own.target(), NodeId(5));
        assert!(own.intermediates().is_empty());
    }
}
