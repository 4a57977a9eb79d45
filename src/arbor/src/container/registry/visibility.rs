use crate::container::registry::ConfigError;
use crate::key::Key;
use crate::tree::{NodeId, NodeTree, ResolvePath};

/// Lifts what every node exports to its parent into the parent's table,
/// deepest nodes first.
///
/// A parent that ends up with two different paths to one identifier is
/// rejected.
pub(super) fn import_from_children(tree: &mut NodeTree) -> Result<(), ConfigError> {
    let ids: Vec<NodeId> = tree.ids().rev().collect();
    for id in ids {
        let node = tree.get(id);
        let Some(parent) = node.parent() else {
            continue;
        };
        let lifted: Vec<(Box<dyn Key>, ResolvePath)> = node
            .visible_entries()
            .filter(|(key, _)| node.export_to_parent().allows(*key))
            .map(|(key, path)| (key.dyn_clone(), path.re_root(parent)))
            .collect();

        let parent_node = tree.get_mut(parent);
        let scope = parent_node.key().dyn_clone();
        let visible = parent_node.visible_mut();
        for (key, path) in lifted {
            match visible.get(key.as_ref()) {
                Some(existing) if *existing == path => {}
                Some(_) => return Err(ConfigError::ImportCollision { key, scope }),
                None => {
                    visible.insert(key, path);
                }
            }
        }
    }
    Ok(())
}

/// Passes what every node exports down to the children willing to import
/// it, parents first. Entries a child already has are kept.
pub(super) fn export_to_children(tree: &mut NodeTree) {
    let ids: Vec<NodeId> = tree.ids().collect();
    for id in ids {
        let Some(parent) = tree.get(id).parent() else {
            continue;
        };
        let parent_node = tree.get(parent);
        let child = tree.get(id);
        let inherited: Vec<(Box<dyn Key>, ResolvePath)> = parent_node
            .visible_entries()
            .filter(|(key, _)| child.visible(*key).is_none())
            .filter(|(key, _)| parent_node.export().allows(*key) && child.import().allows(*key))
            .map(|(key, path)| (key.dyn_clone(), path.clone()))
            .collect();

        let visible = tree.get_mut(id).visible_mut();
        for (key, path) in inherited {
            visible.insert(key, path);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::{ActivationConfig, FilterConfig, NodeConfig};
    use crate::container::registry::{build_tree, Pipeline};
    use crate::key;
    use crate::tree::{MockVisibility, NodeParts, ProviderNode};

    use super::*;

    struct Root;

    struct Left;

    struct Right;

    fn value<T: crate::container::Managed>(value: T) -> NodeConfig {
        NodeConfig::binding(key::of::<T>())
            .with_activation(ActivationConfig::Instance(Arc::new(value)))
    }

    #[test]
    fn import_from_children_fails_when_two_children_export_same_key() {
        let left = NodeConfig::scope(key::of::<Left>())
            .with_child(value(1u8))
            .exporting_to_parent(FilterConfig::AllowAll);
        let right = NodeConfig::scope(key::of::<Right>())
            .with_child(value(2u8))
            .exporting_to_parent(FilterConfig::AllowAll);
        let config = NodeConfig::scope(key::of::<Root>()).with_child(left).with_child(right);

        let err = build_tree(&Arc::new(config), &Pipeline::default()).unwrap_err();
        assert!(matches!(err, ConfigError::ImportCollision { .. }));
        assert!(err.to_string().contains("u8"));
    }

    #[test]
    fn import_from_children_respects_export_filter() {
        let left = NodeConfig::scope(key::of::<Left>())
            .with_child(value(1u8))
            .with_child(value(2u16))
            .exporting_to_parent(FilterConfig::keys([
                Box::new(key::of::<u8>()) as Box<dyn Key>
            ]));
        let config = NodeConfig::scope(key::of::<Root>()).with_child(left);

        let tree = build_tree(&Arc::new(config), &Pipeline::default()).unwrap();
        assert!(tree.lookup(tree.root(), &key::of::<u8>()).is_some());
        assert!(tree.lookup(tree.root(), &key::of::<u16>()).is_none());
    }

    #[test]
    fn export_to_children_respects_import_filter() {
        let left = NodeConfig::scope(key::of::<Left>()).importing(FilterConfig::DenyAll);
        let right = NodeConfig::scope(key::of::<Right>());
        let config = NodeConfig::scope(key::of::<Root>())
            .with_child(value(1u8))
            .with_child(left)
            .with_child(right);

        let tree = build_tree(&Arc::new(config), &Pipeline::default()).unwrap();
        let root = tree.get(tree.root());
        let left = root.child(&key::of::<Left>()).unwrap();
        let right = root.child(&key::of::<Right>()).unwrap();
        assert!(tree.lookup(left, &key::of::<u8>()).is_none());
        assert!(tree.lookup(right, &key::of::<u8>()).is_some());
        assert!(tree.lookup(right, &key::of::<Left>()).is_some());
    }

    #[test]
    fn export_to_children_keeps_own_entries() {
        let left = NodeConfig::scope(key::of::<Left>()).with_child(value(2u8));
        let config = NodeConfig::scope(key::of::<Root>())
            .with_child(value(1u8))
            .with_child(left);

        let tree = build_tree(&Arc::new(config), &Pipeline::default()).unwrap();
        let left = tree.get(tree.root()).child(&key::of::<Left>()).unwrap();
        let path = tree.lookup(left, &key::of::<u8>()).unwrap();
        assert_eq!(path.root(), left);
    }

    #[test]
    fn import_from_children_consults_export_to_parent_filter() {
        let mut filter = MockVisibility::new();
        filter
            .expect_allows()
            .returning(|key| key.to_string().contains("u8"));

        let mut tree = NodeTree::new();
        let root = tree.insert_root(ProviderNode::new(NodeParts::scope(Box::new(
            key::of::<Root>(),
        ))));
        let left = tree
            .register_child(
                root,
                ProviderNode::new(NodeParts {
                    export_to_parent: Arc::new(filter),
                    ..NodeParts::scope(Box::new(key::of::<Left>()))
                }),
            )
            .unwrap();
        for key in [Box::new(key::of::<u8>()) as Box<dyn Key>, Box::new(key::of::<u16>())] {
            tree.register_child(left, ProviderNode::new(NodeParts::scope(key)))
                .unwrap();
        }

        import_from_children(&mut tree).unwrap();
        assert!(tree.lookup(root, &key::of::<u8>()).is_some());
        assert!(tree.lookup(root, &key::of::<u16>()).is_none());
    }
}
